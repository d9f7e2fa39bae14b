use super::Timer;
use russell_lab::{format_nanoseconds, Stopwatch};
use std::fmt;

/// Accumulates the elapsed time of each phase of the nonlinear solver
#[derive(Clone, Debug, Default)]
pub struct Timers {
    reform: u128,
    stiffness: u128,
    solve: u128,
    residual: u128,
    update: u128,
    qn_update: u128,
}

impl Timers {
    /// Allocates a new instance with all counters set to zero
    pub fn new() -> Self {
        Timers::default()
    }

    /// Stops the stopwatch and adds the elapsed time to the given category
    pub fn stop(&mut self, timer: Timer, stopwatch: &mut Stopwatch) {
        let ns = stopwatch.stop();
        *self.slot(timer) += ns;
    }

    /// Returns the accumulated time of a category in nanoseconds
    pub fn nanoseconds(&self, timer: Timer) -> u128 {
        match timer {
            Timer::Reform => self.reform,
            Timer::Stiffness => self.stiffness,
            Timer::Solve => self.solve,
            Timer::Residual => self.residual,
            Timer::Update => self.update,
            Timer::QnUpdate => self.qn_update,
        }
    }

    /// Resets all counters
    pub fn reset(&mut self) {
        *self = Timers::default();
    }

    fn slot(&mut self, timer: Timer) -> &mut u128 {
        match timer {
            Timer::Reform => &mut self.reform,
            Timer::Stiffness => &mut self.stiffness,
            Timer::Solve => &mut self.solve,
            Timer::Residual => &mut self.residual,
            Timer::Update => &mut self.update,
            Timer::QnUpdate => &mut self.qn_update,
        }
    }
}

impl fmt::Display for Timers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timings\n")?;
        write!(f, "=======\n")?;
        write!(f, "reformations      = {}\n", format_nanoseconds(self.reform))?;
        write!(f, "stiffness         = {}\n", format_nanoseconds(self.stiffness))?;
        write!(f, "linear solutions  = {}\n", format_nanoseconds(self.solve))?;
        write!(f, "residuals         = {}\n", format_nanoseconds(self.residual))?;
        write!(f, "updates           = {}\n", format_nanoseconds(self.update))?;
        write!(f, "quasi-Newton      = {}\n", format_nanoseconds(self.qn_update))?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
