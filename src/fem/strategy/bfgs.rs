use super::{NewtonStrategy, QnParams, SecantBuffer, StrategyContext};
use crate::base::{MatrixFormat, NewtonError};
use russell_lab::{vec_inner, vec_update, Vector};
use serde::{Deserialize, Serialize};

/// Implements the BFGS method (Matthies-Strang product form)
///
/// The inverse of the stiffness matrix is updated as
///
/// ```text
/// K⁻¹ ← (I + w vᵀ) K⁻¹ (I + v wᵀ)
/// ```
///
/// with
///
/// ```text
/// δ = s ui     γ = R0 - R1     h = s R0
/// c = √(δ·γ / δ·h)
/// w = δ / (δ·γ)     v = c h - γ
/// ```
///
/// The update is rejected if `δ·γ / δ·h ≤ 0` or if the condition number estimate `c`
/// exceeds `cmax`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BfgsStrategy {
    params: QnParams,
    nups: usize,
    history: SecantBuffer, // pairs (v, w)
}

impl BfgsStrategy {
    /// Allocates a new instance
    pub fn new(params: QnParams) -> Self {
        BfgsStrategy {
            params,
            nups: 0,
            history: SecantBuffer::new(params.max_buffer_size, params.cycle_buffer, 0),
        }
    }

    /// Returns the secant history
    pub fn history(&self) -> &SecantBuffer {
        &self.history
    }
}

impl NewtonStrategy for BfgsStrategy {
    fn init(&mut self, neq: usize) {
        self.nups = 0;
        self.history = SecantBuffer::new(self.params.max_buffer_size, self.params.cycle_buffer, neq);
    }

    fn matrix_format(&self) -> MatrixFormat {
        MatrixFormat::Symmetric
    }

    fn params(&self) -> &QnParams {
        &self.params
    }

    fn nups(&self) -> usize {
        self.nups
    }

    fn reset_updates(&mut self) {
        self.nups = 0;
        self.history.clear();
    }

    fn update(
        &mut self,
        s: f64,
        ui: &Vector,
        r0: &Vector,
        r1: &Vector,
        _ctx: &mut StrategyContext,
    ) -> Result<bool, NewtonError> {
        let n = ui.dim();
        let mut dg = 0.0;
        let mut dh = 0.0;
        for i in 0..n {
            let delta = s * ui[i];
            dg += delta * (r0[i] - r1[i]);
            dh += delta * s * r0[i];
        }
        if dg == 0.0 || dh == 0.0 {
            return Ok(false);
        }
        let r = dg / dh;
        if r <= 0.0 {
            return Ok(false);
        }
        let c = f64::sqrt(r);
        if c > self.params.cmax {
            return Ok(false);
        }
        let mut v = Vector::new(n);
        let mut w = Vector::new(n);
        for i in 0..n {
            v[i] = c * s * r0[i] - (r0[i] - r1[i]);
            w[i] = s * ui[i] / dg;
        }
        if !self.history.push(&v, &w) {
            return Ok(false);
        }
        self.nups += 1;
        Ok(true)
    }

    fn solve_equations(&mut self, x: &mut Vector, b: &Vector, ctx: &mut StrategyContext) -> Result<(), NewtonError> {
        // tmp = (I + v wᵀ) ... b from the newest to the oldest
        let mut tmp = b.clone();
        for k in (0..self.history.len()).rev() {
            let (v, w) = self.history.get(k);
            let wt = vec_inner(w, &tmp);
            vec_update(&mut tmp, wt, v)?;
        }
        ctx.back_solve(x, &tmp)?;
        // x = ... (I + w vᵀ) x from the oldest to the newest
        for k in 0..self.history.len() {
            let (v, w) = self.history.get(k);
            let vx = vec_inner(v, x);
            vec_update(x, vx, w)?;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
