use super::{NewtonStrategy, QnParams, SecantBuffer, StrategyContext};
use crate::base::{MatrixFormat, NewtonError};
use russell_lab::{vec_inner, vec_norm, vec_update, Norm, Vector};
use serde::{Deserialize, Serialize};

/// Implements Broyden's "good" method (inverse update in product form)
///
/// ```text
/// H ← (I + u δᵀ) H     with     u = (δ - H γ) / (δ · H γ)
/// ```
///
/// where `δ = s ui` and `γ = R0 - R1`. The matrix is non-symmetric.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BroydenStrategy {
    params: QnParams,
    nups: usize,
    history: SecantBuffer, // pairs (u, δ)
}

impl BroydenStrategy {
    /// Allocates a new instance
    pub fn new(params: QnParams) -> Self {
        BroydenStrategy {
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

impl NewtonStrategy for BroydenStrategy {
    fn init(&mut self, neq: usize) {
        self.nups = 0;
        self.history = SecantBuffer::new(self.params.max_buffer_size, self.params.cycle_buffer, neq);
    }

    fn matrix_format(&self) -> MatrixFormat {
        MatrixFormat::Unsymmetric
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
        ctx: &mut StrategyContext,
    ) -> Result<bool, NewtonError> {
        if self.history.capacity() == 0 || (self.history.is_full() && !self.params.cycle_buffer) {
            return Ok(false);
        }
        let n = ui.dim();
        let mut delta = Vector::new(n);
        let mut gamma = Vector::new(n);
        for i in 0..n {
            delta[i] = s * ui[i];
            gamma[i] = r0[i] - r1[i];
        }
        let mut h_gamma = Vector::new(n);
        self.solve_equations(&mut h_gamma, &gamma, ctx)?;
        let denom = vec_inner(&delta, &h_gamma);
        let scale = vec_norm(&delta, Norm::Euc) * vec_norm(&h_gamma, Norm::Euc);
        if !denom.is_finite() || f64::abs(denom) <= f64::EPSILON * scale || denom == 0.0 {
            return Ok(false);
        }
        let mut u = Vector::new(n);
        for i in 0..n {
            u[i] = (delta[i] - h_gamma[i]) / denom;
        }
        if vec_norm(&u, Norm::Euc) * vec_norm(&delta, Norm::Euc) > self.params.cmax {
            return Ok(false);
        }
        if !self.history.push(&u, &delta) {
            return Ok(false);
        }
        self.nups += 1;
        Ok(true)
    }

    fn solve_equations(&mut self, x: &mut Vector, b: &Vector, ctx: &mut StrategyContext) -> Result<(), NewtonError> {
        ctx.back_solve(x, b)?;
        for k in 0..self.history.len() {
            let (u, delta) = self.history.get(k);
            let dx = vec_inner(delta, x);
            vec_update(x, dx, u)?;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::BroydenStrategy;
    use crate::base::Config;
    use crate::fem::testing::{diagonal_solver, NullModel};
    use crate::fem::{LinearConstraintManager, NewtonStrategy, QnParams, StrategyContext};
    use russell_lab::{approx_eq, Vector};

    #[test]
    fn updates_satisfy_the_secant_condition() {
        let mut solver = diagonal_solver(&[2.0, 4.0, 1.0]);
        let mut model = NullModel::new();
        let lcm = LinearConstraintManager::new();
        let uu = Vector::new(3);
        let identity_rows = vec![false; 3];
        let mut nrhs = 0;
        let mut ctx = StrategyContext {
            linear_solver: &mut solver,
            model: &mut model,
            lcm: &lcm,
            uu: &uu,
            identity_rows: &identity_rows,
            nrhs: &mut nrhs,
        };

        let mut broyden = BroydenStrategy::new(QnParams::new(&Config::new()));
        broyden.init(3);

        // first update
        let r0 = Vector::from(&[2.0, 4.0, 1.0]);
        let mut ui = Vector::new(3);
        broyden.solve_equations(&mut ui, &r0, &mut ctx).unwrap();
        let r1 = Vector::from(&[0.5, 1.5, -0.2]);
        assert!(broyden.update(1.0, &ui, &r0, &r1, &mut ctx).unwrap());
        let mut x = Vector::new(3);
        broyden.solve_equations(&mut x, &Vector::from(&[1.5, 2.5, 1.2]), &mut ctx).unwrap();
        approx_eq(x[0], ui[0], 1e-14);
        approx_eq(x[1], ui[1], 1e-14);
        approx_eq(x[2], ui[2], 1e-14);

        // second update (with a line search step)
        let s = 0.5;
        broyden.solve_equations(&mut ui, &r1, &mut ctx).unwrap();
        let r2 = Vector::from(&[0.1, 0.3, 0.05]);
        assert!(broyden.update(s, &ui, &r1, &r2, &mut ctx).unwrap());
        assert_eq!(broyden.nups(), 2);
        broyden
            .solve_equations(&mut x, &Vector::from(&[0.4, 1.2, -0.25]), &mut ctx)
            .unwrap();
        approx_eq(x[0], s * ui[0], 1e-13);
        approx_eq(x[1], s * ui[1], 1e-13);
        approx_eq(x[2], s * ui[2], 1e-13);
    }

    #[test]
    fn update_rejects_inadmissible_pairs() {
        let mut solver = diagonal_solver(&[1.0, 1.0]);
        let mut model = NullModel::new();
        let lcm = LinearConstraintManager::new();
        let uu = Vector::new(2);
        let identity_rows = vec![false; 2];
        let mut nrhs = 0;
        let mut ctx = StrategyContext {
            linear_solver: &mut solver,
            model: &mut model,
            lcm: &lcm,
            uu: &uu,
            identity_rows: &identity_rows,
            nrhs: &mut nrhs,
        };
        let mut config = Config::new();
        config.set_max_ups(0).set_buffer(0, true);
        let mut broyden = BroydenStrategy::new(QnParams::new(&config));
        broyden.init(2);
        let ui = Vector::from(&[1.0, 0.0]);
        let r0 = Vector::from(&[1.0, 0.0]);
        let r1 = Vector::from(&[0.5, 0.0]);
        assert!(!broyden.update(1.0, &ui, &r0, &r1, &mut ctx).unwrap()); // zero capacity

        let mut broyden = BroydenStrategy::new(QnParams::new(&Config::new()));
        broyden.init(2);
        // γ ⟂ δ: δ·Hγ = 0
        let r1 = Vector::from(&[1.0, -1.0]);
        assert!(!broyden.update(1.0, &ui, &r0, &r1, &mut ctx).unwrap());
        assert_eq!(broyden.nups(), 0);
    }
}
