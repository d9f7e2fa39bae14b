//! Implements the quasi-Newton strategies
//!
//! A strategy solves `K ui = R` with the last factorized stiffness matrix, possibly
//! corrected by a history of secant updates, and decides whether a new secant update is
//! admissible. When an update is not admissible, the nonlinear solver reforms the
//! stiffness matrix.

mod bfgs;
mod broyden;
mod full_newton;
mod jfnk;
mod secant_buffer;
pub use crate::fem::strategy::bfgs::*;
pub use crate::fem::strategy::broyden::*;
pub use crate::fem::strategy::full_newton::*;
pub use crate::fem::strategy::jfnk::*;
pub use crate::fem::strategy::secant_buffer::*;

use super::{FeModel, LinearConstraintManager, LinearSolver};
use crate::base::{Config, MatrixFormat, NewtonError, QnMethod};
use russell_lab::Vector;
use serde::{Deserialize, Serialize};

/// Holds the parameters shared by all strategies
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct QnParams {
    /// Max number of updates between reformations (0 means full Newton)
    pub max_ups: usize,

    /// Capacity of the secant history
    pub max_buffer_size: usize,

    /// Overwrites the oldest secant pair when the history is full
    pub cycle_buffer: bool,

    /// Max condition number of an update
    pub cmax: f64,
}

impl QnParams {
    /// Extracts the parameters from the configuration
    pub fn new(config: &Config) -> Self {
        QnParams {
            max_ups: config.max_ups,
            max_buffer_size: config.buffer_capacity(),
            cycle_buffer: config.cycle_buffer,
            cmax: config.cmax,
        }
    }
}

/// Holds the collaborators available to a strategy while solving and updating
pub struct StrategyContext<'a> {
    /// Linear solver holding the last factorized stiffness matrix
    pub linear_solver: &'a mut dyn LinearSolver,

    /// Model (needed by the Jacobian-free method only)
    pub model: &'a mut dyn FeModel,

    /// Linear constraints applied to the residual
    pub lcm: &'a LinearConstraintManager,

    /// Accumulated increment of the current time step (current configuration)
    pub uu: &'a Vector,

    /// Rows of the stiffness matrix that are the identity (prescribed DOFs and parents)
    pub identity_rows: &'a [bool],

    /// Counter of residual evaluations
    pub nrhs: &'a mut usize,
}

impl<'a> StrategyContext<'a> {
    /// Solves the linear system with the last factorized matrix
    pub fn back_solve(&mut self, x: &mut Vector, b: &Vector) -> Result<(), NewtonError> {
        self.linear_solver.back_solve(x, b).map_err(NewtonError::linear_solver)
    }
}

/// Defines the operations of a quasi-Newton strategy
pub trait NewtonStrategy {
    /// Allocates the data for `neq` equations (and clears the history)
    fn init(&mut self, neq: usize);

    /// Returns the preferred storage format of the stiffness matrix
    fn matrix_format(&self) -> MatrixFormat;

    /// Returns the parameters
    fn params(&self) -> &QnParams;

    /// Returns the number of updates since the last reformation
    fn nups(&self) -> usize;

    /// Discards all updates (called after each reformation)
    fn reset_updates(&mut self);

    /// Called before the first solution of a time step or after an augmentation
    fn pre_solve_update(&mut self) {}

    /// Performs a secant update
    ///
    /// # Input
    ///
    /// * `s` -- the line search step
    /// * `ui` -- the solution increment of the last iteration
    /// * `r0` -- the residual at the beginning of the last iteration
    /// * `r1` -- the residual at the end of the last iteration
    ///
    /// Returns false if the update is not admissible (a reformation is required).
    fn update(
        &mut self,
        s: f64,
        ui: &Vector,
        r0: &Vector,
        r1: &Vector,
        ctx: &mut StrategyContext,
    ) -> Result<bool, NewtonError>;

    /// Solves `K x = b` using the factorized matrix and the updates
    fn solve_equations(&mut self, x: &mut Vector, b: &Vector, ctx: &mut StrategyContext) -> Result<(), NewtonError>;
}

/// Holds the selected quasi-Newton strategy
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum QnStrategy {
    FullNewton(FullNewtonStrategy),
    Bfgs(BfgsStrategy),
    Broyden(BroydenStrategy),
    Jfnk(JfnkStrategy),
}

impl QnStrategy {
    /// Allocates the strategy corresponding to a method
    pub fn new(method: QnMethod, config: &Config) -> Self {
        let params = QnParams::new(config);
        match method {
            QnMethod::FullNewton => QnStrategy::FullNewton(FullNewtonStrategy::new(params)),
            QnMethod::Bfgs => QnStrategy::Bfgs(BfgsStrategy::new(params)),
            QnMethod::Broyden => QnStrategy::Broyden(BroydenStrategy::new(params)),
            QnMethod::Jfnk => QnStrategy::Jfnk(JfnkStrategy::new(params, config)),
        }
    }

    /// Returns the method of this strategy
    pub fn method(&self) -> QnMethod {
        match self {
            QnStrategy::FullNewton(_) => QnMethod::FullNewton,
            QnStrategy::Bfgs(_) => QnMethod::Bfgs,
            QnStrategy::Broyden(_) => QnMethod::Broyden,
            QnStrategy::Jfnk(_) => QnMethod::Jfnk,
        }
    }

    /// Returns the max number of updates between reformations
    pub fn max_ups(&self) -> usize {
        self.actual().params().max_ups
    }

    /// Returns the actual strategy
    pub fn actual(&self) -> &dyn NewtonStrategy {
        match self {
            QnStrategy::FullNewton(s) => s,
            QnStrategy::Bfgs(s) => s,
            QnStrategy::Broyden(s) => s,
            QnStrategy::Jfnk(s) => s,
        }
    }

    /// Returns the actual strategy (mutable)
    pub fn actual_mut(&mut self) -> &mut dyn NewtonStrategy {
        match self {
            QnStrategy::FullNewton(s) => s,
            QnStrategy::Bfgs(s) => s,
            QnStrategy::Broyden(s) => s,
            QnStrategy::Jfnk(s) => s,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{QnParams, QnStrategy};
    use crate::base::{Config, MatrixFormat, QnMethod};

    #[test]
    fn new_works() {
        let mut config = Config::new();
        config.set_buffer(3, false);
        let params = QnParams::new(&config);
        assert_eq!(params.max_ups, 10);
        assert_eq!(params.max_buffer_size, 3);
        assert_eq!(params.cycle_buffer, false);

        for (method, format) in [
            (QnMethod::FullNewton, MatrixFormat::Symmetric),
            (QnMethod::Bfgs, MatrixFormat::Symmetric),
            (QnMethod::Broyden, MatrixFormat::Unsymmetric),
            (QnMethod::Jfnk, MatrixFormat::Unsymmetric),
        ] {
            let strategy = QnStrategy::new(method, &config);
            assert_eq!(strategy.method(), method);
            assert_eq!(strategy.actual().matrix_format(), format);
            assert_eq!(strategy.actual().nups(), 0);
        }
        assert_eq!(QnStrategy::new(QnMethod::FullNewton, &config).max_ups(), 0);
        assert_eq!(QnStrategy::new(QnMethod::Bfgs, &config).max_ups(), 10);
    }

    #[test]
    fn serialize_works() {
        let config = Config::new();
        let strategy = QnStrategy::new(QnMethod::Broyden, &config);
        let json = serde_json::to_string(&strategy).unwrap();
        let read: QnStrategy = serde_json::from_str(&json).unwrap();
        assert_eq!(read.method(), QnMethod::Broyden);
        assert_eq!(read.max_ups(), 10);
    }
}
