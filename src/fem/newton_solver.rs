use super::{evaluate_residual, Assembler, Checkpoint, ControlConvergence, DeepCheckpoint, FeModel, GlobalMatrix};
use super::{LineSearch, LinearConstraint, LinearConstraintManager, LinearSolver, MatrixProfile, QnStrategy};
use super::{SparseSolver, StrategyContext};
use crate::base::{AugmentPolicy, Config, MatrixFormat, NewtonError, Timer, Timers};
use crate::StrError;
use russell_lab::{vec_copy, vec_inner, vec_update, Stopwatch, Vector};
use serde::{Deserialize, Serialize};

/// Holds the counters of the nonlinear solver (reset at every time step)
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct SolverCounters {
    /// Number of iterations
    pub niter: usize,

    /// Number of residual evaluations
    pub nrhs: usize,

    /// Number of stiffness reformations (reset after each augmentation)
    pub nref: usize,

    /// Total number of stiffness reformations
    pub ntotref: usize,

    /// Number of augmentations
    pub naug: usize,

    /// Number of calls to the secant update
    pub nqn: usize,
}

/// Holds the global vectors of the nonlinear solver
struct Workspace {
    /// Residual at the beginning of the iteration
    r0: Vector,

    /// Residual at the end of the iteration
    r1: Vector,

    /// Solution increment (holds the prescribed increments before the first solution)
    ui: Vector,

    /// Contributions of the prescribed DOFs
    fd: Vector,

    /// Accumulated increment of the time step
    uu: Vector,

    /// Trial increment
    ut: Vector,

    /// Rows of the stiffness matrix that are the identity
    identity_rows: Vec<bool>,
}

impl Workspace {
    fn new(neq: usize) -> Self {
        Workspace {
            r0: Vector::new(neq),
            r1: Vector::new(neq),
            ui: Vector::new(neq),
            fd: Vector::new(neq),
            uu: Vector::new(neq),
            ut: Vector::new(neq),
            identity_rows: vec![false; neq],
        }
    }
}

/// Outcome of the initialization of a time step
enum StepStart {
    Ready,
    Converged,
    Failed,
}

/// Implements the quasi-Newton solver that drives a time step to equilibrium
///
/// Each call to [NewtonSolver::solve_step] performs:
///
/// ```text
/// prep_step → (reform) → R0 = R + fd
/// loop
///     solve K ui = R0 → line search (uu + s ui) → R1 → convergence?
///     no:  secant update or reformation; R0 ← R1
///     yes: augmentations → done or restart the iterations
/// ```
///
/// All numerical failures are returned as [NewtonError] by the internal phases and
/// reported once by [NewtonSolver::solve_step], which returns false so that the caller
/// may cut the time step back.
pub struct NewtonSolver {
    /// Holds the configuration parameters
    config: Config,

    /// Number of equations
    neq: usize,

    /// Holds the quasi-Newton strategy
    strategy: QnStrategy,

    /// Holds the line search
    line_search: LineSearch,

    /// Holds the linear solver
    linear_solver: Box<dyn LinearSolver>,

    /// Holds the global stiffness matrix
    kk: GlobalMatrix,

    /// Holds the linear constraints
    lcm: LinearConstraintManager,

    /// Holds the global vectors
    ws: Workspace,

    /// Holds the counters
    counters: SolverCounters,

    /// Controls the convergence
    control: ControlConvergence,

    /// Accumulates the elapsed times
    timers: Timers,

    /// Matrix storage format (after the negotiation with the linear solver)
    format: MatrixFormat,

    /// Forces a reformation at the next opportunity
    force_reform: bool,

    /// Requests the reconstruction of the sparsity pattern
    reshape: bool,

    /// Line search step of the last iteration
    step: f64,

    /// Error of the last failed time step
    last_error: Option<NewtonError>,
}

impl NewtonSolver {
    /// Allocates a new instance with the default sparse solver
    pub fn new(config: &Config) -> Result<Self, StrError> {
        let linear_solver = SparseSolver::new(
            config.lin_sol_genie,
            config.lin_sol_params,
            config.verbose_lin_sys_solve,
        );
        NewtonSolver::with_linear_solver(config, Box::new(linear_solver))
    }

    /// Allocates a new instance with a given linear solver
    pub fn with_linear_solver(config: &Config, linear_solver: Box<dyn LinearSolver>) -> Result<Self, StrError> {
        if let Some(msg) = config.validate() {
            println!("ERROR: {}", msg);
            return Err("cannot allocate the nonlinear solver because config.validate() failed");
        }
        Ok(NewtonSolver {
            config: config.clone(),
            neq: 0,
            strategy: QnStrategy::new(config.qn_method, config),
            line_search: LineSearch::new(config),
            linear_solver,
            kk: GlobalMatrix::new(0),
            lcm: LinearConstraintManager::new(),
            ws: Workspace::new(0),
            counters: SolverCounters::default(),
            control: ControlConvergence::new(config),
            timers: Timers::new(),
            format: MatrixFormat::Symmetric,
            force_reform: true,
            reshape: true,
            step: 1.0,
            last_error: None,
        })
    }

    /// Replaces the quasi-Newton strategy (call `init` afterwards)
    pub fn set_strategy(&mut self, strategy: QnStrategy) {
        self.strategy = strategy;
        self.neq = 0;
    }

    /// Adds a linear constraint (call `init` afterwards)
    pub fn add_linear_constraint(&mut self, constraint: LinearConstraint) -> Result<(), StrError> {
        self.lcm.add(constraint)?;
        self.reshape = true;
        Ok(())
    }

    /// Allocates the global vectors and the linear system for `neq` equations
    ///
    /// Must be called again whenever the number of equations changes.
    pub fn init(&mut self, neq: usize) -> Result<(), StrError> {
        if neq == 0 {
            return Err("the number of equations must be greater than zero");
        }
        self.strategy.actual_mut().init(neq);
        self.ws = Workspace::new(neq);
        self.kk = GlobalMatrix::new(neq);
        self.neq = neq;
        self.allocate_linear_system()?;
        self.reshape = true;
        self.force_reform = true;
        Ok(())
    }

    /// Negotiates the storage format with the linear solver and sets the partitions
    fn allocate_linear_system(&mut self) -> Result<(), StrError> {
        let mut format = self.strategy.actual().matrix_format();
        if format == MatrixFormat::Symmetric && !self.linear_solver.supports(format) {
            println!("WARNING: The matrix format was changed to non-symmetric since the selected linear solver does not support a symmetric format.");
            format = MatrixFormat::Unsymmetric;
        }
        if !self.linear_solver.supports(format) {
            return Err("the linear solver does not support any matrix format");
        }
        self.linear_solver.create(self.neq, format)?;
        self.format = format;
        let fp = self.config.force_partition;
        if fp > 0 && fp < self.neq {
            self.linear_solver.set_partitions(&[fp, self.neq - fp]);
        }
        Ok(())
    }

    /// Solves the current time step
    ///
    /// Returns true if the iterations and the augmentations have converged. The errors are
    /// printed and available via [NewtonSolver::last_error].
    pub fn solve_step(&mut self, model: &mut dyn FeModel) -> bool {
        self.last_error = None;
        if self.neq == 0 {
            println!("ERROR: the nonlinear solver must be initialized first");
            return false;
        }
        match self.quasin(model) {
            Ok(converged) => {
                if converged && self.config.verbose_summary {
                    println!("convergence summary");
                    println!("    number of iterations   : {}", self.counters.niter);
                    println!("    number of reformations : {}", self.counters.ntotref);
                }
                converged
            }
            Err(err) => {
                let converged = err == NewtonError::ForceConversion;
                if err.is_user_forced() {
                    println!("WARNING: {}", err);
                } else {
                    println!("ERROR: {}", err);
                }
                self.last_error = Some(err);
                converged
            }
        }
    }

    /// Runs the quasi-Newton iterations and the augmentations
    fn quasin(&mut self, model: &mut dyn FeModel) -> Result<bool, NewtonError> {
        self.counters = SolverCounters::default();
        self.strategy.actual_mut().reset_updates();
        self.control.reset();
        self.ws.uu.fill(0.0);
        self.ws.ui.fill(0.0);
        model.prep_step(&mut self.ws.ui)?;

        match self.qn_init(model)? {
            StepStart::Ready => (),
            StepStart::Converged => return Ok(true),
            StepStart::Failed => return Ok(false),
        }

        self.control.print_header();
        loop {
            loop {
                self.qn_solve(model)?;
                let converged = self.check_convergence()?;
                if !converged && !self.qn_update(model)? {
                    self.control.print_footer();
                    return Ok(false);
                }
                self.counters.niter += 1;
                model.minor_iteration(self.counters.niter)?;
                if converged {
                    break;
                }
                let max = self.config.max_iterations;
                if max > 0 && self.counters.niter >= max {
                    return Err(NewtonError::MaxIterations(max));
                }
            }
            if self.do_augmentations(model)? {
                break;
            }
            self.control.restart();
        }
        self.control.print_footer();
        Ok(true)
    }

    /// Initializes the iterations of a time step
    fn qn_init(&mut self, model: &mut dyn FeModel) -> Result<StepStart, NewtonError> {
        self.strategy.actual_mut().pre_solve_update();

        let mut sw = Stopwatch::new();
        evaluate_residual(model, &mut self.ws.r0, &self.lcm, true)?;
        self.counters.nrhs += 1;
        self.timers.stop(Timer::Residual, &mut sw);

        // nothing to do (the pending reformation is kept)
        let prescribed = self.ws.ui.as_data().iter().any(|v| *v != 0.0);
        if !prescribed && vec_inner(&self.ws.r0, &self.ws.r0) < self.config.r_min {
            if self.config.verbose_iterations {
                println!("the residual is zero; the time step has converged");
            }
            return Ok(StepStart::Converged);
        }

        // the prescribed increments reach the right-hand side during the assembly
        if self.force_reform || self.config.reform_each_time_step || prescribed {
            self.force_reform = false;
            if !self.reform(model)? {
                return Ok(StepStart::Failed);
            }
        } else {
            // fd belongs to the step that assembled it
            self.ws.fd.fill(0.0);
        }
        vec_update(&mut self.ws.r0, 1.0, &self.ws.fd)?;
        Ok(StepStart::Ready)
    }

    /// Solves for the increment and updates the configuration
    fn qn_solve(&mut self, model: &mut dyn FeModel) -> Result<(), NewtonError> {
        let mut sw = Stopwatch::new();
        {
            let mut ctx = StrategyContext {
                linear_solver: self.linear_solver.as_mut(),
                model: &mut *model,
                lcm: &self.lcm,
                uu: &self.ws.uu,
                identity_rows: &self.ws.identity_rows,
                nrhs: &mut self.counters.nrhs,
            };
            self.strategy
                .actual_mut()
                .solve_equations(&mut self.ws.ui, &self.ws.r0, &mut ctx)?;
        }
        self.lcm.update_increment(&mut self.ws.ui);
        self.timers.stop(Timer::Solve, &mut sw);
        if !vec_inner(&self.ws.ui, &self.ws.ui).is_finite() {
            return Err(NewtonError::NanDetected);
        }

        sw.reset();
        if self.line_search.enabled() {
            let (s, ntrial) = self.line_search.search(
                model,
                &self.lcm,
                &self.ws.uu,
                &self.ws.ui,
                &self.ws.r0,
                &mut self.ws.r1,
                &mut self.ws.ut,
            )?;
            self.step = s;
            self.counters.nrhs += ntrial;
        } else {
            self.step = 1.0;
            for i in 0..self.neq {
                self.ws.ut[i] = self.ws.uu[i] + self.ws.ui[i];
            }
            model.update(&self.ws.ut)?;
            evaluate_residual(model, &mut self.ws.r1, &self.lcm, false)?;
            self.counters.nrhs += 1;
        }
        self.timers.stop(Timer::Update, &mut sw);
        Ok(())
    }

    /// Accumulates the increment and checks the convergence
    fn check_convergence(&mut self) -> Result<bool, NewtonError> {
        vec_update(&mut self.ws.uu, self.step, &self.ws.ui)?;
        let nups = self.strategy.actual().nups();
        let converged = self
            .control
            .analyze(self.step, &self.ws.ui, &self.ws.r0, &self.ws.r1, &self.ws.uu, nups)?;
        self.control.print_iteration(self.counters.niter, nups);
        if !converged && self.control.diverging() {
            if self.config.verbose_reforms {
                println!("WARNING: Problem is diverging. Stiffness matrix will now be reformed.");
            }
            self.force_reform = true;
        }
        Ok(converged)
    }

    /// Performs the secant update or the reformation
    ///
    /// Returns false if the reformation has failed.
    fn qn_update(&mut self, model: &mut dyn FeModel) -> Result<bool, NewtonError> {
        let mut reform = self.force_reform;
        self.force_reform = false;
        let max_ups = self.strategy.max_ups();
        if max_ups == 0 {
            reform = true;
        }
        if !reform {
            let mut sw = Stopwatch::new();
            if self.strategy.actual().nups() >= max_ups - 1 {
                if self.config.verbose_reforms {
                    println!("WARNING: Max nr of updates reached. Stiffness matrix will now be reformed.");
                }
                reform = true;
            }
            let mut ctx = StrategyContext {
                linear_solver: self.linear_solver.as_mut(),
                model: &mut *model,
                lcm: &self.lcm,
                uu: &self.ws.uu,
                identity_rows: &self.ws.identity_rows,
                nrhs: &mut self.counters.nrhs,
            };
            self.counters.nqn += 1;
            let admissible =
                self.strategy
                    .actual_mut()
                    .update(self.step, &self.ws.ui, &self.ws.r0, &self.ws.r1, &mut ctx)?;
            if !admissible {
                if self.config.verbose_reforms {
                    println!("WARNING: The QN update has failed. Stiffness matrix will now be reformed.");
                }
                reform = true;
            }
            self.timers.stop(Timer::QnUpdate, &mut sw);
        }

        // ui may hold prescribed increments consumed by the assembly
        self.ws.ui.fill(0.0);

        if reform && self.config.do_reforms && !self.reform(model)? {
            return Ok(false);
        }
        vec_copy(&mut self.ws.r0, &self.ws.r1)?;
        Ok(true)
    }

    /// Reforms and factorizes the stiffness matrix
    ///
    /// Returns false if the model could not evaluate the stiffness matrix.
    pub fn reform_stiffness(&mut self, model: &mut dyn FeModel) -> Result<bool, NewtonError> {
        if self.neq == 0 {
            return Err(NewtonError::Fatal(
                "the nonlinear solver must be initialized first".to_string(),
            ));
        }
        self.reform(model)
    }

    fn reform(&mut self, model: &mut dyn FeModel) -> Result<bool, NewtonError> {
        if self.counters.nref >= self.config.max_refs {
            return Err(NewtonError::MaxStiffnessReformations {
                max_refs: self.config.max_refs,
            });
        }
        let mut sw = Stopwatch::new();
        if self.reshape || model.needs_reshape() {
            self.create_stiffness(model)?;
        }

        self.kk.zero();
        self.ws.fd.fill(0.0);
        self.ws.identity_rows.fill(false);
        let mut sw_stiffness = Stopwatch::new();
        let ok = {
            let mut assembler = Assembler::new(
                &mut self.kk,
                &mut self.ws.fd,
                &self.ws.ui,
                &self.lcm,
                &mut self.ws.identity_rows,
            );
            model.stiffness_matrix(&mut assembler)?
        };
        self.timers.stop(Timer::Stiffness, &mut sw_stiffness);
        if !ok {
            return Ok(false);
        }
        self.lcm.set_parent_diagonals(&mut self.kk, &mut self.ws.identity_rows)?;

        if self.config.check_zero_diagonal {
            let tol = self.config.zero_diagonal_tol;
            let equations: Vec<usize> = (0..self.neq).filter(|i| f64::abs(self.kk.diag(*i)) <= tol).collect();
            if !equations.is_empty() {
                return Err(NewtonError::ZeroDiagonal { equations });
            }
        }

        self.linear_solver
            .factor(&self.kk)
            .map_err(NewtonError::linear_solver)?;
        self.counters.nref += 1;
        self.counters.ntotref += 1;
        self.strategy.actual_mut().reset_updates();
        self.timers.stop(Timer::Reform, &mut sw);
        if self.config.verbose_reforms {
            println!(
                "stiffness matrix reformation # {} (nnz = {})",
                self.counters.ntotref,
                self.kk.nonzeros()
            );
        }
        Ok(true)
    }

    /// Builds the sparsity pattern and prepares the linear solver
    fn create_stiffness(&mut self, model: &mut dyn FeModel) -> Result<(), NewtonError> {
        if self.kk.has_pattern() {
            self.linear_solver.destroy();
        }
        let mut profile = MatrixProfile::new(self.neq);
        model.build_matrix_profile(&mut profile)?;
        self.lcm.expand_profile(&mut profile)?;
        self.kk.create(&profile);
        self.linear_solver
            .pre_process(&self.kk)
            .map_err(NewtonError::linear_solver)?;
        self.reshape = false;
        Ok(())
    }

    /// Runs one pass of the augmented Lagrangian loop
    ///
    /// Returns true if all constraints are satisfied.
    fn do_augmentations(&mut self, model: &mut dyn FeModel) -> Result<bool, NewtonError> {
        let naug = self.counters.naug;
        let mut converged = true;
        let mut active = false;
        for constraint in model.constraints_mut() {
            if constraint.is_active() {
                if !active && self.config.verbose_augmentations {
                    println!("\n........................ augmentation # {}", naug + 1);
                }
                active = true;
                converged &= constraint.augment(naug)?;
            }
        }
        if !active {
            return Ok(true);
        }
        self.counters.naug += 1;
        self.counters.nref = 0;

        let max = self.config.max_augmentations;
        if !converged && max > 0 && self.counters.naug >= max {
            match self.config.augment_policy {
                AugmentPolicy::AcceptAtMax => {
                    println!(
                        "WARNING: max number of augmentations ({}) reached; the time step is accepted",
                        max
                    );
                    converged = true;
                }
                AugmentPolicy::FailAtMax => return Err(NewtonError::MaxAugmentations(max)),
            }
        }

        if !converged {
            // the multipliers changed: refresh the state and recompute the residual
            model.update_state()?;
            let mut sw = Stopwatch::new();
            evaluate_residual(model, &mut self.ws.r0, &self.lcm, false)?;
            self.counters.nrhs += 1;
            self.timers.stop(Timer::Residual, &mut sw);
            self.strategy.actual_mut().pre_solve_update();
            if self.strategy.max_ups() == 0 || self.config.reform_augment {
                self.ws.ui.fill(0.0);
                if !self.reform(model)? {
                    return Err(NewtonError::Fatal(
                        "the stiffness matrix cannot be reformed after the augmentation".to_string(),
                    ));
                }
            }
        }
        Ok(converged)
    }

    /// Forces a reformation at the beginning of the next time step (after a failure)
    pub fn rewind(&mut self) {
        self.force_reform = true;
    }

    /// Sets or clears the flag that forces a reformation at the next opportunity
    pub fn force_reform(&mut self, flag: bool) {
        self.force_reform = flag;
    }

    /// Returns the stiffness matrix assembled at the last reformation
    pub fn stiffness_matrix(&self) -> &GlobalMatrix {
        &self.kk
    }

    /// Returns the linear solver
    pub fn linear_solver(&self) -> &dyn LinearSolver {
        self.linear_solver.as_ref()
    }

    /// Returns a copy of the current right-hand side
    pub fn load_vector(&self) -> Vector {
        self.ws.r0.clone()
    }

    /// Returns the accumulated increment of the last time step
    pub fn increment(&self) -> &Vector {
        &self.ws.uu
    }

    /// Returns the contributions of the prescribed DOFs added to the residual
    ///
    /// Holds the values assembled at the last reformation; a time step that starts
    /// without a reformation clears them.
    pub fn prescribed_forces(&self) -> &Vector {
        &self.ws.fd
    }

    /// Returns the counters of the last time step
    pub fn counters(&self) -> &SolverCounters {
        &self.counters
    }

    /// Returns the quasi-Newton strategy
    pub fn strategy(&self) -> &QnStrategy {
        &self.strategy
    }

    /// Returns the line search
    pub fn line_search(&self) -> &LineSearch {
        &self.line_search
    }

    /// Returns the storage format of the stiffness matrix
    pub fn matrix_format(&self) -> MatrixFormat {
        self.format
    }

    /// Returns the number of equations
    pub fn neq(&self) -> usize {
        self.neq
    }

    /// Returns the elapsed times
    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// Returns the error of the last failed time step
    pub fn last_error(&self) -> Option<&NewtonError> {
        self.last_error.as_ref()
    }

    /// Takes a checkpoint between time steps
    ///
    /// A shallow checkpoint holds the line search only.
    pub fn checkpoint(&self, deep: bool) -> Checkpoint {
        Checkpoint {
            line_search: self.line_search,
            deep: if deep {
                Some(DeepCheckpoint {
                    neq: self.neq,
                    max_refs: self.config.max_refs,
                    qn_default: self.config.qn_method,
                    strategy: self.strategy.clone(),
                })
            } else {
                None
            },
        }
    }

    /// Restores a checkpoint
    ///
    /// The global vectors and the linear system are reallocated if `neq > 0`.
    pub fn restore(&mut self, checkpoint: &Checkpoint) -> Result<(), StrError> {
        self.line_search = checkpoint.line_search;
        if let Some(deep) = &checkpoint.deep {
            if deep.max_refs < 1 {
                return Err("max_refs in the checkpoint must be ≥ 1");
            }
            self.config.max_refs = deep.max_refs;
            self.config.qn_method = deep.qn_default;
            self.strategy = deep.strategy.clone();
            self.neq = deep.neq;
            if deep.neq > 0 {
                self.ws = Workspace::new(deep.neq);
                self.kk = GlobalMatrix::new(deep.neq);
                self.allocate_linear_system()?;
                self.reshape = true;
                self.force_reform = true;
            }
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::NewtonSolver;
    use crate::base::{Config, MatrixFormat, NewtonError, QnMethod};
    use crate::fem::testing::LinearModel;
    use crate::fem::{DenseSolver, LinearConstraint, NewtonStrategy, QnStrategy};
    use russell_lab::{approx_eq, Matrix};

    fn dense(symmetric: bool) -> Box<DenseSolver> {
        Box::new(DenseSolver::new(symmetric))
    }

    #[test]
    fn new_captures_errors() {
        let mut config = Config::new();
        config
            .set_tolerances(0.0, 0.0, 0.0)
            .unwrap()
            .set_residual_bounds(0.0, 0.0)
            .unwrap();
        assert_eq!(
            NewtonSolver::with_linear_solver(&config, dense(true)).err(),
            Some("cannot allocate the nonlinear solver because config.validate() failed")
        );
    }

    #[test]
    fn init_negotiates_the_matrix_format() {
        let config = Config::new();
        let mut solver = NewtonSolver::with_linear_solver(&config, dense(false)).unwrap();
        assert_eq!(solver.init(0).err(), Some("the number of equations must be greater than zero"));
        solver.init(3).unwrap();
        assert_eq!(solver.neq(), 3);
        assert_eq!(solver.matrix_format(), MatrixFormat::Unsymmetric);

        let mut solver = NewtonSolver::with_linear_solver(&config, dense(true)).unwrap();
        solver.init(3).unwrap();
        assert_eq!(solver.matrix_format(), MatrixFormat::Symmetric);
    }

    #[test]
    fn solve_step_requires_init() {
        let config = Config::new();
        let mut solver = NewtonSolver::with_linear_solver(&config, dense(true)).unwrap();
        let kk = Matrix::from(&[[1.0]]);
        let mut model = LinearModel::new(&kk, &[1.0]);
        assert_eq!(solver.solve_step(&mut model), false);
        assert_eq!(
            solver.reform_stiffness(&mut model).err(),
            Some(NewtonError::Fatal("the nonlinear solver must be initialized first".to_string()))
        );
    }

    #[test]
    fn single_equation_converges_in_one_iteration() {
        let config = Config::new();
        let mut solver = NewtonSolver::with_linear_solver(&config, dense(true)).unwrap();
        solver.init(1).unwrap();
        let kk = Matrix::from(&[[1.0]]);
        let mut model = LinearModel::new(&kk, &[1.0]);
        assert!(solver.solve_step(&mut model));
        assert_eq!(solver.counters().niter, 1);
        assert_eq!(solver.counters().nref, 1);
        assert_eq!(model.u()[0], 1.0);
        assert_eq!(solver.increment()[0], 1.0);
        assert_eq!(model.n_stiffness, 1);
    }

    #[test]
    fn zero_residual_converges_without_iterations() {
        let config = Config::new();
        let mut solver = NewtonSolver::with_linear_solver(&config, dense(true)).unwrap();
        solver.init(2).unwrap();
        let kk = Matrix::from(&[[2.0, 0.0], [0.0, 2.0]]);
        let mut model = LinearModel::new(&kk, &[0.0, 0.0]);
        assert!(solver.solve_step(&mut model));
        assert_eq!(solver.counters().niter, 0);
        assert_eq!(solver.counters().ntotref, 0);
        assert_eq!(model.n_stiffness, 0);
    }

    #[test]
    fn full_newton_reforms_every_iteration() {
        let mut config = Config::new();
        config
            .set_qn_method(QnMethod::FullNewton)
            .set_tolerances(1e-20, 0.0, 0.0)
            .unwrap()
            .set_line_search(0.0, 0.01, 5)
            .unwrap();
        let mut solver = NewtonSolver::with_linear_solver(&config, dense(true)).unwrap();
        solver.init(1).unwrap();
        let kk = Matrix::from(&[[1.0]]);
        let mut model = LinearModel::new(&kk, &[2.0]).with_cubic_term(1.0);
        assert!(solver.solve_step(&mut model));
        // u + u³ = 2 ⇒ u = 1
        approx_eq(model.u()[0], 1.0, 1e-10);
        let counters = solver.counters();
        assert_eq!(counters.ntotref, counters.niter);
        assert!(counters.niter > 2);
        assert_eq!(solver.strategy().actual().nups(), 0);
    }

    #[test]
    fn bfgs_solves_a_nonlinear_problem() {
        let mut config = Config::new();
        config.set_tolerances(1e-16, 0.0, 0.0).unwrap();
        let mut solver = NewtonSolver::with_linear_solver(&config, dense(true)).unwrap();
        solver.init(2).unwrap();
        let kk = Matrix::from(&[[2.0, -1.0], [-1.0, 2.0]]);
        let mut model = LinearModel::new(&kk, &[1.0, 2.0]).with_cubic_term(0.5);
        assert!(solver.solve_step(&mut model));
        let u = model.u();
        approx_eq(2.0 * u[0] - u[1] + 0.5 * u[0] * u[0] * u[0], 1.0, 1e-7);
        approx_eq(-u[0] + 2.0 * u[1] + 0.5 * u[1] * u[1] * u[1], 2.0, 1e-7);
        assert!(solver.counters().niter >= 2);
        // fewer reformations than iterations
        assert!(solver.counters().ntotref < solver.counters().niter);
    }

    #[test]
    fn max_iterations_is_captured() {
        let mut config = Config::new();
        config
            .set_qn_method(QnMethod::FullNewton)
            .set_tolerances(1e-30, 0.0, 0.0)
            .unwrap()
            .set_residual_bounds(0.0, 0.0)
            .unwrap()
            .set_max_iterations(1);
        let mut solver = NewtonSolver::with_linear_solver(&config, dense(true)).unwrap();
        solver.init(1).unwrap();
        let kk = Matrix::from(&[[1.0]]);
        let mut model = LinearModel::new(&kk, &[2.0]).with_cubic_term(1.0);
        assert_eq!(solver.solve_step(&mut model), false);
        assert_eq!(solver.last_error(), Some(&NewtonError::MaxIterations(1)));
    }

    #[test]
    fn linear_constraints_are_enforced() {
        // u0 = u1 (parent 0, child 1); springs to the ground with K = 1 and 3; loads 1 and 3
        let config = Config::new();
        let mut solver = NewtonSolver::with_linear_solver(&config, dense(true)).unwrap();
        solver
            .add_linear_constraint(LinearConstraint::new(0, &[(1, 1.0)], 0.0))
            .unwrap();
        solver.init(2).unwrap();
        let kk = Matrix::from(&[[1.0, 0.0], [0.0, 3.0]]);
        let mut model = LinearModel::new(&kk, &[1.0, 3.0]);
        assert!(solver.solve_step(&mut model));
        // (1 + 3) u = 1 + 3
        approx_eq(model.u()[0], 1.0, 1e-14);
        approx_eq(model.u()[1], 1.0, 1e-14);
    }

    #[test]
    fn checkpoint_and_restore_work() {
        let config = Config::new();
        let mut solver = NewtonSolver::with_linear_solver(&config, dense(true)).unwrap();
        solver.init(1).unwrap();
        let kk = Matrix::from(&[[1.0]]);
        let mut model = LinearModel::new(&kk, &[1.0]);
        assert!(solver.solve_step(&mut model));

        let shallow = solver.checkpoint(false);
        assert!(shallow.deep.is_none());
        let deep = solver.checkpoint(true);

        let mut config = Config::new();
        config.set_qn_method(QnMethod::Broyden);
        let mut other = NewtonSolver::with_linear_solver(&config, dense(true)).unwrap();
        other.restore(&shallow).unwrap();
        assert_eq!(other.neq(), 0);
        other.restore(&deep).unwrap();
        assert_eq!(other.neq(), 1);
        assert_eq!(other.strategy().method(), QnMethod::Bfgs);
        let mut model = LinearModel::new(&kk, &[2.0]);
        assert!(other.solve_step(&mut model));
        assert_eq!(model.u()[0], 2.0);
        assert_eq!(other.counters().nref, 1);
    }

    #[test]
    fn set_strategy_requires_init() {
        let config = Config::new();
        let mut solver = NewtonSolver::with_linear_solver(&config, dense(true)).unwrap();
        solver.init(1).unwrap();
        solver.set_strategy(QnStrategy::new(QnMethod::Broyden, &config));
        assert_eq!(solver.neq(), 0);
        solver.init(1).unwrap();
        assert_eq!(solver.matrix_format(), MatrixFormat::Unsymmetric);
    }
}
