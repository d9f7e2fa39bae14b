use super::{NewtonStrategy, QnParams, StrategyContext};
use crate::base::{MatrixFormat, NewtonError};
use russell_lab::Vector;
use serde::{Deserialize, Serialize};

/// Implements the full Newton method
///
/// No secant update is ever admissible; hence, the stiffness matrix is reformed at
/// every iteration.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FullNewtonStrategy {
    params: QnParams,
}

impl FullNewtonStrategy {
    /// Allocates a new instance (forces `max_ups = 0`)
    pub fn new(params: QnParams) -> Self {
        FullNewtonStrategy {
            params: QnParams { max_ups: 0, ..params },
        }
    }
}

impl NewtonStrategy for FullNewtonStrategy {
    fn init(&mut self, _neq: usize) {}

    fn matrix_format(&self) -> MatrixFormat {
        MatrixFormat::Symmetric
    }

    fn params(&self) -> &QnParams {
        &self.params
    }

    fn nups(&self) -> usize {
        0
    }

    fn reset_updates(&mut self) {}

    fn update(
        &mut self,
        _s: f64,
        _ui: &Vector,
        _r0: &Vector,
        _r1: &Vector,
        _ctx: &mut StrategyContext,
    ) -> Result<bool, NewtonError> {
        Ok(false)
    }

    fn solve_equations(&mut self, x: &mut Vector, b: &Vector, ctx: &mut StrategyContext) -> Result<(), NewtonError> {
        ctx.back_solve(x, b)
    }
}
