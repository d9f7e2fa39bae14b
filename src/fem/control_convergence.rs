use crate::base::{Config, NewtonError};
use russell_lab::{vec_inner, Vector};

/// Controls the convergence of the quasi-Newton iterations
///
/// All norms are squared norms (or energies):
///
/// ```text
/// ‖R‖² = R1 · R1            ‖Δu‖² = s² (ui · ui)
/// ‖U‖² = uu · uu            E     = |s (ui · R1)|
/// ```
///
/// The reference values `‖R₀‖² = |R0 · R0|` and `E₀ = |ui · R0|` are taken at the first
/// iteration (and after each augmentation). The iterations converge when every enabled
/// criterion holds:
///
/// ```text
/// ‖R‖²  ≤ tol_r ‖R₀‖²       ‖Δu‖² ≤ tol_d² ‖U‖²       E ≤ tol_e E₀
/// ```
///
/// or when `‖R‖² < r_min`. The energy is diverging if `E > Em`, where `Em` is the largest
/// accepted energy.
pub struct ControlConvergence {
    tol_r: f64,
    tol_d: f64,
    tol_e: f64,
    r_min: f64,
    r_max: f64,
    diverge_reform: bool,
    max_diverging: usize,
    verbose: bool,
    first: bool,
    norm_ri: f64,
    norm_ei: f64,
    norm_em: f64,
    norm_r1: f64,
    norm_u: f64,
    norm_uu: f64,
    norm_e1: f64,
    step: f64,
    converged: bool,
    small_residual: bool,
    diverging: bool,
    n_diverging: usize,
}

impl ControlConvergence {
    /// Allocates a new instance
    pub fn new(config: &Config) -> Self {
        ControlConvergence {
            tol_r: config.tol_r,
            tol_d: config.tol_d,
            tol_e: config.tol_e,
            r_min: config.r_min,
            r_max: config.r_max,
            diverge_reform: config.diverge_reform,
            max_diverging: config.max_diverging,
            verbose: config.verbose_iterations,
            first: true,
            norm_ri: 0.0,
            norm_ei: 0.0,
            norm_em: 0.0,
            norm_r1: 0.0,
            norm_u: 0.0,
            norm_uu: 0.0,
            norm_e1: 0.0,
            step: 1.0,
            converged: false,
            small_residual: false,
            diverging: false,
            n_diverging: 0,
        }
    }

    /// Resets the controller for a new time step
    pub fn reset(&mut self) {
        self.first = true;
        self.converged = false;
        self.small_residual = false;
        self.diverging = false;
        self.n_diverging = 0;
    }

    /// Takes new reference norms at the next analysis (e.g., after an augmentation)
    pub fn restart(&mut self) {
        self.first = true;
        self.converged = false;
        self.diverging = false;
    }

    /// Returns true if the last analysis has converged
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Returns true if the last analysis requests a reformation due to divergence
    pub fn diverging(&self) -> bool {
        self.diverging
    }

    /// Returns the squared norm of the last residual
    pub fn norm_residual(&self) -> f64 {
        self.norm_r1
    }

    /// Returns the last energy
    pub fn energy(&self) -> f64 {
        self.norm_e1
    }

    /// Analyzes the convergence of one iteration
    ///
    /// # Input
    ///
    /// * `s` -- the line search step
    /// * `ui` -- the solution increment
    /// * `r0` -- the residual used to compute `ui`
    /// * `r1` -- the residual at `uu`
    /// * `uu` -- the accumulated increment (already including `s ui`)
    /// * `nups` -- the number of secant updates since the last reformation
    ///
    /// Returns true if converged.
    pub(crate) fn analyze(
        &mut self,
        s: f64,
        ui: &Vector,
        r0: &Vector,
        r1: &Vector,
        uu: &Vector,
        nups: usize,
    ) -> Result<bool, NewtonError> {
        if self.first {
            self.first = false;
            self.norm_ri = f64::abs(vec_inner(r0, r0));
            self.norm_ei = f64::abs(vec_inner(ui, r0));
            self.norm_em = self.norm_ei;
        }
        self.step = s;
        self.norm_r1 = vec_inner(r1, r1);
        self.norm_u = s * s * vec_inner(ui, ui);
        self.norm_uu = vec_inner(uu, uu);
        self.norm_e1 = f64::abs(s * vec_inner(ui, r1));
        if !self.norm_r1.is_finite() || !self.norm_e1.is_finite() {
            return Err(NewtonError::NanDetected);
        }

        let mut converged = true;
        if self.tol_r > 0.0 && self.norm_r1 > self.tol_r * self.norm_ri {
            converged = false;
        }
        if self.tol_d > 0.0 && self.norm_u > self.tol_d * self.tol_d * self.norm_uu {
            converged = false;
        }
        if self.tol_e > 0.0 && self.norm_e1 > self.tol_e * self.norm_ei {
            converged = false;
        }
        let energy_increased = self.norm_e1 > self.norm_em;
        if self.diverge_reform && energy_increased {
            converged = false;
        }

        self.small_residual = false;
        if !converged && self.norm_r1 < self.r_min {
            converged = true;
            self.small_residual = true;
        }
        if !converged && self.r_max > 0.0 && self.norm_r1 >= self.r_max {
            return Err(NewtonError::MaxResidual { norm: self.norm_r1 });
        }

        self.diverging = false;
        if !converged && energy_increased {
            // diverging with a fresh tangent
            if nups == 0 {
                self.n_diverging += 1;
                if self.max_diverging > 0 && self.n_diverging >= self.max_diverging {
                    return Err(NewtonError::EnergyDiverging { energy: self.norm_e1 });
                }
            }
            if self.diverge_reform {
                self.diverging = true;
                self.norm_em = self.norm_e1;
                self.norm_ei = self.norm_e1;
                self.norm_ri = self.norm_r1;
            }
        } else {
            self.n_diverging = 0;
        }
        self.converged = converged;
        Ok(converged)
    }

    /// Prints the header of the convergence table
    pub(crate) fn print_header(&self) {
        if self.verbose {
            println!("\n{}", "─".repeat(79));
            println!(
                "{:>5} {:>5} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}",
                "iter", "nups", "s", "‖R‖²", "‖R₀‖²", "‖Δu‖²", "E", "E₀"
            );
            println!("{}", "─".repeat(79));
        }
    }

    /// Prints the results of the last analysis
    pub(crate) fn print_iteration(&self, niter: usize, nups: usize) {
        if self.verbose {
            let icon = if self.converged {
                "✅"
            } else if self.diverging {
                "🎈"
            } else {
                "🔹"
            };
            println!(
                "{:>5} {:>5} {:>9.2e} {:>9.2e} {:>9.2e} {:>9.2e} {:>9.2e} {:>9.2e} {}",
                niter + 1,
                nups,
                self.step,
                self.norm_r1,
                self.norm_ri,
                self.norm_u,
                self.norm_e1,
                self.norm_ei,
                icon
            );
            if self.small_residual {
                println!("WARNING: convergence due to the small residual norm ‖R‖² = {:.2e}", self.norm_r1);
            }
        }
    }

    /// Prints the horizontal line at the end of the iterations
    pub(crate) fn print_footer(&self) {
        if self.verbose {
            println!("{}", "─".repeat(79));
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
