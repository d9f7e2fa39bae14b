use super::{AugmentPolicy, QnMethod};
use crate::StrError;
use russell_sparse::{Genie, LinSolParams};
use std::fmt;

/// Holds the configuration of the nonlinear equation solver
///
/// The defaults reproduce the classic quasi-Newton setup: BFGS with at most 10 updates
/// between reformations, a reformation at the beginning of every time step, energy and
/// displacement convergence checks, and a quadratic line search.
#[derive(Clone, Debug)]
pub struct Config {
    /// Quasi-Newton method used when no strategy is set explicitly
    pub qn_method: QnMethod,

    /// Max number of stiffness reformations per augmentation pass
    pub max_refs: usize,

    /// Max number of quasi-Newton updates between reformations (0 means full Newton)
    pub max_ups: usize,

    /// Capacity of the secant history (0 means `max_ups`)
    pub max_buffer_size: usize,

    /// Overwrites the oldest secant pair when the history is full
    pub cycle_buffer: bool,

    /// Max condition number admitted by the secant updates
    pub cmax: f64,

    /// Checks the diagonal of the stiffness matrix before factorizing it
    pub check_zero_diagonal: bool,

    /// Tolerance of the zero-diagonal check (|Kii| ≤ tol fails)
    pub zero_diagonal_tol: f64,

    /// Size of the first partition handed to the linear solver (0 means no partition)
    pub force_partition: usize,

    /// Reforms the stiffness matrix at the beginning of every time step
    pub reform_each_time_step: bool,

    /// Reforms the stiffness matrix after every augmentation
    pub reform_augment: bool,

    /// Reforms the stiffness matrix when the energy norm diverges
    pub diverge_reform: bool,

    /// Allows reformations at all (otherwise only the initial one happens)
    pub do_reforms: bool,

    /// Relative residual tolerance (0 disables the check)
    pub tol_r: f64,

    /// Relative displacement tolerance (0 disables the check)
    pub tol_d: f64,

    /// Relative energy tolerance (0 disables the check)
    pub tol_e: f64,

    /// Absolute residual tolerance: |R|² < r_min means converged
    pub r_min: f64,

    /// Max residual norm |R|² (0 disables the check)
    pub r_max: f64,

    /// Line search tolerance (0 disables the line search)
    pub ls_tol: f64,

    /// Minimum line search step
    pub ls_min: f64,

    /// Max number of line search trials
    pub ls_iter: usize,

    /// Max number of iterations per augmentation pass (0 means unlimited)
    pub max_iterations: usize,

    /// Max number of augmentations per time step (0 means unlimited)
    pub max_augmentations: usize,

    /// What to do when `max_augmentations` is reached
    pub augment_policy: AugmentPolicy,

    /// Max number of consecutive divergences on a freshly formed tangent (0 means unlimited)
    pub max_diverging: usize,

    /// Max number of GMRES iterations per JFNK solve
    pub jfnk_max_iter: usize,

    /// Restart length of GMRES
    pub jfnk_restart: usize,

    /// Relative tolerance of GMRES
    pub jfnk_tol: f64,

    /// Perturbation used by the finite-difference Jacobian-vector product
    pub jfnk_epsilon: f64,

    /// Uses the factorized stiffness matrix as right preconditioner of GMRES
    pub jfnk_precondition: bool,

    /// Linear solver type
    pub lin_sol_genie: Genie,

    /// Parameters for the linear solver
    pub lin_sol_params: LinSolParams,

    /// Shows the convergence table
    pub verbose_iterations: bool,

    /// Shows messages about stiffness reformations
    pub verbose_reforms: bool,

    /// Shows messages about augmentations
    pub verbose_augmentations: bool,

    /// Shows a summary at the end of each converged step
    pub verbose_summary: bool,

    /// Shows the linear solver messages
    pub verbose_lin_sys_solve: bool,
}

impl Config {
    /// Allocates a new instance with default values
    pub fn new() -> Self {
        Config {
            qn_method: QnMethod::Bfgs,
            max_refs: 15,
            max_ups: 10,
            max_buffer_size: 0,
            cycle_buffer: true,
            cmax: 1e5,
            check_zero_diagonal: true,
            zero_diagonal_tol: 0.0,
            force_partition: 0,
            reform_each_time_step: true,
            reform_augment: false,
            diverge_reform: true,
            do_reforms: true,
            tol_r: 0.0,
            tol_d: 0.001,
            tol_e: 0.01,
            r_min: 1e-20,
            r_max: 0.0,
            ls_tol: 0.9,
            ls_min: 0.01,
            ls_iter: 5,
            max_iterations: 0,
            max_augmentations: 100,
            augment_policy: AugmentPolicy::AcceptAtMax,
            max_diverging: 3,
            jfnk_max_iter: 100,
            jfnk_restart: 30,
            jfnk_tol: 1e-8,
            jfnk_epsilon: 1e-7,
            jfnk_precondition: true,
            lin_sol_genie: Genie::Umfpack,
            lin_sol_params: LinSolParams::new(),
            verbose_iterations: false,
            verbose_reforms: false,
            verbose_augmentations: false,
            verbose_summary: false,
            verbose_lin_sys_solve: false,
        }
    }

    /// Sets the quasi-Newton method
    ///
    /// **Note:** Full Newton also sets `max_ups = 0`.
    pub fn set_qn_method(&mut self, method: QnMethod) -> &mut Self {
        self.qn_method = method;
        if method == QnMethod::FullNewton {
            self.max_ups = 0;
        }
        self
    }

    /// Sets the max number of stiffness reformations
    pub fn set_max_refs(&mut self, value: usize) -> Result<&mut Self, StrError> {
        if value < 1 {
            return Err("max_refs must be ≥ 1");
        }
        self.max_refs = value;
        Ok(self)
    }

    /// Sets the max number of quasi-Newton updates between reformations
    pub fn set_max_ups(&mut self, value: usize) -> &mut Self {
        self.max_ups = value;
        self
    }

    /// Sets the secant history capacity and whether the oldest pairs are overwritten
    pub fn set_buffer(&mut self, max_buffer_size: usize, cycle: bool) -> &mut Self {
        self.max_buffer_size = max_buffer_size;
        self.cycle_buffer = cycle;
        self
    }

    /// Sets the max condition number of the secant updates
    pub fn set_cmax(&mut self, value: f64) -> Result<&mut Self, StrError> {
        if value <= 0.0 {
            return Err("cmax must be > 0.0");
        }
        self.cmax = value;
        Ok(self)
    }

    /// Enables or disables the zero-diagonal check
    pub fn set_check_zero_diagonal(&mut self, flag: bool, tol: f64) -> Result<&mut Self, StrError> {
        if tol < 0.0 {
            return Err("zero_diagonal_tol must be ≥ 0.0");
        }
        self.check_zero_diagonal = flag;
        self.zero_diagonal_tol = tol;
        Ok(self)
    }

    /// Sets the size of the first partition handed to the linear solver
    pub fn set_force_partition(&mut self, value: usize) -> &mut Self {
        self.force_partition = value;
        self
    }

    /// Sets the reformation policy
    pub fn set_reform_policy(&mut self, each_time_step: bool, augment: bool, diverge: bool) -> &mut Self {
        self.reform_each_time_step = each_time_step;
        self.reform_augment = augment;
        self.diverge_reform = diverge;
        self
    }

    /// Allows or forbids reformations after the initial one
    pub fn set_do_reforms(&mut self, flag: bool) -> &mut Self {
        self.do_reforms = flag;
        self
    }

    /// Sets the relative convergence tolerances (0 disables the corresponding check)
    pub fn set_tolerances(&mut self, tol_r: f64, tol_d: f64, tol_e: f64) -> Result<&mut Self, StrError> {
        if tol_r < 0.0 || tol_d < 0.0 || tol_e < 0.0 {
            return Err("convergence tolerances must be ≥ 0.0");
        }
        self.tol_r = tol_r;
        self.tol_d = tol_d;
        self.tol_e = tol_e;
        Ok(self)
    }

    /// Sets the absolute residual bounds
    pub fn set_residual_bounds(&mut self, r_min: f64, r_max: f64) -> Result<&mut Self, StrError> {
        if r_min < 0.0 {
            return Err("r_min must be ≥ 0.0");
        }
        if r_max < 0.0 {
            return Err("r_max must be ≥ 0.0");
        }
        self.r_min = r_min;
        self.r_max = r_max;
        Ok(self)
    }

    /// Sets the line search parameters (ls_tol = 0 disables the line search)
    pub fn set_line_search(&mut self, ls_tol: f64, ls_min: f64, ls_iter: usize) -> Result<&mut Self, StrError> {
        if ls_tol < 0.0 {
            return Err("ls_tol must be ≥ 0.0");
        }
        if ls_min < 0.0 || ls_min >= 1.0 {
            return Err("ls_min must be in [0.0, 1.0)");
        }
        self.ls_tol = ls_tol;
        self.ls_min = ls_min;
        self.ls_iter = ls_iter;
        Ok(self)
    }

    /// Sets the max number of iterations per augmentation pass (0 means unlimited)
    pub fn set_max_iterations(&mut self, value: usize) -> &mut Self {
        self.max_iterations = value;
        self
    }

    /// Sets the augmentation ceiling and what happens when it is reached
    pub fn set_max_augmentations(&mut self, value: usize, policy: AugmentPolicy) -> &mut Self {
        self.max_augmentations = value;
        self.augment_policy = policy;
        self
    }

    /// Sets the max number of consecutive divergences on a fresh tangent
    pub fn set_max_diverging(&mut self, value: usize) -> &mut Self {
        self.max_diverging = value;
        self
    }

    /// Sets the parameters of the Jacobian-free Newton-Krylov method
    pub fn set_jfnk(
        &mut self,
        max_iter: usize,
        restart: usize,
        tol: f64,
        epsilon: f64,
        precondition: bool,
    ) -> Result<&mut Self, StrError> {
        if max_iter < 1 {
            return Err("jfnk_max_iter must be ≥ 1");
        }
        if restart < 1 {
            return Err("jfnk_restart must be ≥ 1");
        }
        if tol <= 0.0 {
            return Err("jfnk_tol must be > 0.0");
        }
        if epsilon <= 0.0 {
            return Err("jfnk_epsilon must be > 0.0");
        }
        self.jfnk_max_iter = max_iter;
        self.jfnk_restart = restart;
        self.jfnk_tol = tol;
        self.jfnk_epsilon = epsilon;
        self.jfnk_precondition = precondition;
        Ok(self)
    }

    /// Sets the linear solver type
    pub fn set_lin_sol_genie(&mut self, genie: Genie) -> &mut Self {
        self.lin_sol_genie = genie;
        self
    }

    /// Sets all verbose flags at once
    pub fn set_verbose(&mut self, iterations: bool, reforms: bool, augmentations: bool, summary: bool) -> &mut Self {
        self.verbose_iterations = iterations;
        self.verbose_reforms = reforms;
        self.verbose_augmentations = augmentations;
        self.verbose_summary = summary;
        self
    }

    /// Validates all data
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self) -> Option<String> {
        if self.max_refs < 1 {
            return Some(format!("max_refs = {:?} is incorrect; it must be ≥ 1", self.max_refs));
        }
        if self.cmax <= 0.0 {
            return Some(format!("cmax = {:?} is incorrect; it must be > 0.0", self.cmax));
        }
        if self.zero_diagonal_tol < 0.0 {
            return Some(format!(
                "zero_diagonal_tol = {:?} is incorrect; it must be ≥ 0.0",
                self.zero_diagonal_tol
            ));
        }
        if self.tol_r < 0.0 || self.tol_d < 0.0 || self.tol_e < 0.0 {
            return Some(format!(
                "tolerances (tol_r, tol_d, tol_e) = ({:?}, {:?}, {:?}) are incorrect; they must be ≥ 0.0",
                self.tol_r, self.tol_d, self.tol_e
            ));
        }
        if self.tol_r == 0.0 && self.tol_d == 0.0 && self.tol_e == 0.0 && self.r_min == 0.0 {
            return Some("all convergence criteria are disabled; at least one tolerance must be > 0.0".to_string());
        }
        if self.r_min < 0.0 {
            return Some(format!("r_min = {:?} is incorrect; it must be ≥ 0.0", self.r_min));
        }
        if self.r_max < 0.0 {
            return Some(format!("r_max = {:?} is incorrect; it must be ≥ 0.0", self.r_max));
        }
        if self.r_max > 0.0 && self.r_max <= self.r_min {
            return Some(format!(
                "r_max = {:?} is incorrect; it must be > r_min = {:?}",
                self.r_max, self.r_min
            ));
        }
        if self.ls_tol < 0.0 {
            return Some(format!("ls_tol = {:?} is incorrect; it must be ≥ 0.0", self.ls_tol));
        }
        if self.ls_min < 0.0 || self.ls_min >= 1.0 {
            return Some(format!("ls_min = {:?} is incorrect; it must be in [0.0, 1.0)", self.ls_min));
        }
        if self.ls_tol > 0.0 && self.ls_iter < 1 {
            return Some(format!(
                "ls_iter = {:?} is incorrect; it must be ≥ 1 when the line search is enabled",
                self.ls_iter
            ));
        }
        if self.qn_method == QnMethod::FullNewton && self.max_ups != 0 {
            return Some(format!(
                "max_ups = {:?} is incorrect; it must be 0 with the full Newton method",
                self.max_ups
            ));
        }
        if self.qn_method == QnMethod::Jfnk {
            if self.jfnk_max_iter < 1 || self.jfnk_restart < 1 {
                return Some(format!(
                    "(jfnk_max_iter, jfnk_restart) = ({:?}, {:?}) are incorrect; they must be ≥ 1",
                    self.jfnk_max_iter, self.jfnk_restart
                ));
            }
            if self.jfnk_tol <= 0.0 || self.jfnk_epsilon <= 0.0 {
                return Some(format!(
                    "(jfnk_tol, jfnk_epsilon) = ({:?}, {:?}) are incorrect; they must be > 0.0",
                    self.jfnk_tol, self.jfnk_epsilon
                ));
            }
        }
        None // all good
    }

    /// Returns the capacity of the secant history
    pub fn buffer_capacity(&self) -> usize {
        if self.max_buffer_size > 0 {
            self.max_buffer_size
        } else {
            self.max_ups
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonlinear solution parameters\n")?;
        write!(f, "=============================\n")?;
        write!(f, "qn_method = {}\n", self.qn_method.key())?;
        write!(f, "max_refs = {:?}\n", self.max_refs)?;
        write!(f, "max_ups = {:?}\n", self.max_ups)?;
        write!(f, "max_buffer_size = {:?}\n", self.buffer_capacity())?;
        write!(f, "cycle_buffer = {:?}\n", self.cycle_buffer)?;
        write!(f, "cmax = {:?}\n", self.cmax)?;
        write!(f, "reform_each_time_step = {:?}\n", self.reform_each_time_step)?;
        write!(f, "reform_augment = {:?}\n", self.reform_augment)?;
        write!(f, "diverge_reform = {:?}\n", self.diverge_reform)?;
        write!(f, "(tol_r, tol_d, tol_e) = ({:?}, {:?}, {:?})\n", self.tol_r, self.tol_d, self.tol_e)?;
        write!(f, "(r_min, r_max) = ({:?}, {:?})\n", self.r_min, self.r_max)?;
        write!(f, "(ls_tol, ls_min, ls_iter) = ({:?}, {:?}, {:?})\n", self.ls_tol, self.ls_min, self.ls_iter)?;
        write!(f, "max_augmentations = {:?} ({:?})\n", self.max_augmentations, self.augment_policy)?;
        write!(f, "lin_sol_genie = {:?}\n", self.lin_sol_genie)?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::Config;
    use crate::base::{AugmentPolicy, QnMethod};
    use crate::StrError;

    #[test]
    fn new_works() {
        let config = Config::new();
        assert_eq!(config.qn_method, QnMethod::Bfgs);
        assert_eq!(config.max_refs, 15);
        assert_eq!(config.max_ups, 10);
        assert_eq!(config.buffer_capacity(), 10);
        assert_eq!(config.cmax, 1e5);
        assert_eq!(config.tol_d, 0.001);
        assert_eq!(config.tol_e, 0.01);
        assert_eq!(config.r_min, 1e-20);
        assert_eq!(config.ls_tol, 0.9);
        assert_eq!(config.ls_min, 0.01);
        assert_eq!(config.ls_iter, 5);
        assert_eq!(config.augment_policy, AugmentPolicy::AcceptAtMax);
        assert_eq!(config.validate(), None);
    }

    #[test]
    fn setters_work() -> Result<(), StrError> {
        let mut config = Config::new();
        config
            .set_max_refs(3)?
            .set_buffer(4, false)
            .set_cmax(100.0)?
            .set_tolerances(1e-8, 0.0, 0.0)?
            .set_line_search(0.0, 0.01, 5)?
            .set_max_augmentations(7, AugmentPolicy::FailAtMax);
        assert_eq!(config.max_refs, 3);
        assert_eq!(config.buffer_capacity(), 4);
        assert_eq!(config.cycle_buffer, false);
        assert_eq!(config.tol_r, 1e-8);
        assert_eq!(config.ls_tol, 0.0);
        assert_eq!(config.max_augmentations, 7);
        assert_eq!(config.validate(), None);

        config.set_qn_method(QnMethod::FullNewton);
        assert_eq!(config.max_ups, 0);
        assert_eq!(config.buffer_capacity(), 4);
        assert_eq!(config.validate(), None);
        Ok(())
    }

    #[test]
    fn setters_capture_errors() {
        let mut config = Config::new();
        assert_eq!(config.set_max_refs(0).err(), Some("max_refs must be ≥ 1"));
        assert_eq!(config.set_cmax(0.0).err(), Some("cmax must be > 0.0"));
        assert_eq!(
            config.set_tolerances(-1.0, 0.0, 0.0).err(),
            Some("convergence tolerances must be ≥ 0.0")
        );
        assert_eq!(
            config.set_line_search(0.9, 1.0, 5).err(),
            Some("ls_min must be in [0.0, 1.0)")
        );
        assert_eq!(
            config.set_jfnk(10, 0, 1e-8, 1e-7, true).err(),
            Some("jfnk_restart must be ≥ 1")
        );
    }

    #[test]
    fn validate_captures_errors() {
        let mut config = Config::new();
        config.max_refs = 0;
        assert_eq!(
            config.validate(),
            Some("max_refs = 0 is incorrect; it must be ≥ 1".to_string())
        );

        let mut config = Config::new();
        config.tol_d = 0.0;
        config.tol_e = 0.0;
        config.r_min = 0.0;
        assert_eq!(
            config.validate(),
            Some("all convergence criteria are disabled; at least one tolerance must be > 0.0".to_string())
        );

        let mut config = Config::new();
        config.r_max = 1e-30;
        assert_eq!(
            config.validate(),
            Some("r_max = 1e-30 is incorrect; it must be > r_min = 1e-20".to_string())
        );

        let mut config = Config::new();
        config.qn_method = QnMethod::FullNewton;
        assert_eq!(
            config.validate(),
            Some("max_ups = 10 is incorrect; it must be 0 with the full Newton method".to_string())
        );
    }

    #[test]
    fn display_works() {
        let config = Config::new();
        let text = format!("{}", config);
        assert!(text.starts_with("Nonlinear solution parameters\n"));
        assert!(text.contains("qn_method = BFGS\n"));
        assert!(text.contains("(ls_tol, ls_min, ls_iter) = (0.9, 0.01, 5)\n"));
    }
}
