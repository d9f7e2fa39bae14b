use super::{FeModel, NewtonSolver};
use crate::base::NewtonError;
use crate::StrError;

/// Drives the time steps of a nonlinear analysis with automatic cut-back
///
/// Each time step is solved by [NewtonSolver::solve_step]. When a step fails, the model
/// returns to the start of the step, the solver is rewound (the next step starts with a
/// reformation), and the step is retried with `Δt / 2`. After a step that needed at most
/// `target_iterations` iterations, `Δt` grows by `growth` (up to `dt_max`).
pub struct TimeStepper {
    /// Current time
    t: f64,

    /// Final time
    t_fin: f64,

    /// Current time increment
    dt: f64,

    /// Minimum time increment
    dt_min: f64,

    /// Maximum time increment
    dt_max: f64,

    /// Max number of consecutive retries of a time step
    max_retries: usize,

    /// Growth factor of Δt after an easy step
    growth: f64,

    /// Max number of iterations of an easy step
    target_iterations: usize,

    /// Number of accepted time steps
    pub n_accepted: usize,

    /// Number of rejected time steps
    pub n_rejected: usize,

    /// Shows the time steps
    verbose: bool,

    /// Error returned by the model when accepting a converged time step
    accept_error: Option<NewtonError>,
}

impl TimeStepper {
    /// Allocates a new instance
    pub fn new(t_ini: f64, t_fin: f64, dt: f64, dt_min: f64) -> Result<Self, StrError> {
        if t_fin <= t_ini {
            return Err("t_fin must be greater than t_ini");
        }
        if dt_min <= 0.0 {
            return Err("Δt_min must be > 0.0");
        }
        if dt < dt_min {
            return Err("Δt is smaller than the allowed minimum");
        }
        Ok(TimeStepper {
            t: t_ini,
            t_fin,
            dt,
            dt_min,
            dt_max: dt,
            max_retries: 10,
            growth: 1.0,
            target_iterations: 0,
            n_accepted: 0,
            n_rejected: 0,
            verbose: false,
            accept_error: None,
        })
    }

    /// Sets the max number of consecutive retries of a time step
    pub fn set_max_retries(&mut self, value: usize) -> &mut Self {
        self.max_retries = value;
        self
    }

    /// Enables the growth of Δt after the steps with at most `target_iterations` iterations
    pub fn set_growth(&mut self, growth: f64, target_iterations: usize, dt_max: f64) -> Result<&mut Self, StrError> {
        if growth < 1.0 {
            return Err("the growth factor must be ≥ 1.0");
        }
        if dt_max < self.dt {
            return Err("Δt_max must be ≥ Δt");
        }
        self.growth = growth;
        self.target_iterations = target_iterations;
        self.dt_max = dt_max;
        Ok(self)
    }

    /// Sets the verbose mode
    pub fn set_verbose(&mut self, flag: bool) -> &mut Self {
        self.verbose = flag;
        self
    }

    /// Returns the current time
    pub fn time(&self) -> f64 {
        self.t
    }

    /// Returns the current time increment
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Returns the error of the model that stopped the run while accepting a time step
    pub fn accept_error(&self) -> Option<&NewtonError> {
        self.accept_error.as_ref()
    }

    /// Runs all time steps until t_fin
    pub fn run(&mut self, solver: &mut NewtonSolver, model: &mut dyn FeModel) -> Result<(), StrError> {
        let mut retries = 0;
        if self.verbose {
            println!("{:>8} {:>13} {:>13} {:>5} {:>5}", "timestep", "t", "Δt", "iter", "ref");
        }
        while self.t < self.t_fin {
            let dt = f64::min(self.dt, self.t_fin - self.t);
            let t_new = self.t + dt;
            model.set_time(t_new, dt);

            if solver.solve_step(model) {
                if let Err(err) = model.accept_step() {
                    println!("ERROR: {}", err);
                    self.accept_error = Some(err);
                    return Err("cannot accept the converged time step");
                }
                self.t = t_new;
                self.n_accepted += 1;
                retries = 0;
                let counters = solver.counters();
                if self.verbose {
                    println!(
                        "{:>8} {:>13.6e} {:>13.6e} {:>5} {:>5}",
                        self.n_accepted, self.t, dt, counters.niter, counters.ntotref
                    );
                }
                if self.growth > 1.0 && counters.niter <= self.target_iterations {
                    self.dt = f64::min(self.dt * self.growth, self.dt_max);
                }
            } else {
                model.reject_step();
                solver.rewind();
                self.n_rejected += 1;
                retries += 1;
                self.dt = 0.5 * dt;
                if self.verbose {
                    println!("WARNING: the time step failed; retrying with Δt = {:.6e}", self.dt);
                }
                if retries > self.max_retries {
                    return Err("the max number of retries of a time step has been reached");
                }
                if self.dt < self.dt_min {
                    return Err("Δt is smaller than the allowed minimum");
                }
            }
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
