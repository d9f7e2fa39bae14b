use super::{NewtonStrategy, QnParams, StrategyContext};
use crate::base::{Config, MatrixFormat, NewtonError};
use crate::fem::{evaluate_residual, Gmres};
use russell_lab::{vec_norm, Norm, Vector};
use serde::{Deserialize, Serialize};

/// Implements the Jacobian-free Newton-Krylov method
///
/// The linear system is solved by GMRES where the Jacobian-vector product is approximated
/// by finite differences of the residual:
///
/// ```text
/// K v ≈ (R(uu) - R(uu + ε v)) / ε
/// ```
///
/// The factorized stiffness matrix (if enabled) is used as right preconditioner.
/// The rows of prescribed DOFs (and parents of linear constraints) are the identity.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct JfnkStrategy {
    params: QnParams,
    nups: usize,
    max_iter: usize,
    restart: usize,
    tol: f64,
    epsilon: f64,
    precondition: bool,
    last_iterations: usize,
    total_iterations: usize,
}

impl JfnkStrategy {
    /// Allocates a new instance
    pub fn new(params: QnParams, config: &Config) -> Self {
        JfnkStrategy {
            params,
            nups: 0,
            max_iter: config.jfnk_max_iter,
            restart: config.jfnk_restart,
            tol: config.jfnk_tol,
            epsilon: config.jfnk_epsilon,
            precondition: config.jfnk_precondition,
            last_iterations: 0,
            total_iterations: 0,
        }
    }

    /// Returns the number of Krylov iterations of the last solution
    pub fn last_iterations(&self) -> usize {
        self.last_iterations
    }

    /// Returns the number of Krylov iterations since the allocation
    pub fn total_iterations(&self) -> usize {
        self.total_iterations
    }
}

impl NewtonStrategy for JfnkStrategy {
    fn init(&mut self, _neq: usize) {
        self.nups = 0;
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
    }

    fn update(
        &mut self,
        _s: f64,
        _ui: &Vector,
        _r0: &Vector,
        _r1: &Vector,
        _ctx: &mut StrategyContext,
    ) -> Result<bool, NewtonError> {
        self.nups += 1;
        Ok(true)
    }

    fn solve_equations(&mut self, x: &mut Vector, b: &Vector, ctx: &mut StrategyContext) -> Result<(), NewtonError> {
        let n = b.dim();
        let StrategyContext {
            linear_solver,
            model,
            lcm,
            uu,
            identity_rows,
            nrhs,
        } = ctx;

        // residual at the current configuration
        let mut r_base = Vector::new(n);
        evaluate_residual(&mut **model, &mut r_base, lcm, false)?;
        **nrhs += 1;

        let uu_norm = vec_norm(uu, Norm::Euc);
        let mut r_pert = Vector::new(n);
        let mut u_pert = Vector::new(n);
        let mut dv = Vector::new(n);
        let epsilon = self.epsilon;
        let gmres = Gmres::new(self.max_iter, self.restart, self.tol);
        let precondition = self.precondition;
        let result = gmres.solve(
            x,
            b,
            |v, out| {
                let v_norm = vec_norm(v, Norm::Euc);
                if v_norm == 0.0 {
                    out.fill(0.0);
                    return Ok(());
                }
                // identity rows are fixed by the assembly; the parents follow the children
                for i in 0..n {
                    dv[i] = if identity_rows[i] { 0.0 } else { v[i] };
                }
                lcm.update_increment(&mut dv);
                let eps = epsilon * (1.0 + uu_norm) / v_norm;
                for i in 0..n {
                    u_pert[i] = uu[i] + eps * dv[i];
                }
                model.update(&u_pert)?;
                evaluate_residual(&mut **model, &mut r_pert, lcm, false)?;
                **nrhs += 1;
                for i in 0..n {
                    out[i] = if identity_rows[i] {
                        v[i]
                    } else {
                        (r_base[i] - r_pert[i]) / eps
                    };
                }
                Ok(())
            },
            |v, out| {
                if precondition {
                    linear_solver.back_solve(out, v).map_err(NewtonError::linear_solver)
                } else {
                    for i in 0..n {
                        out[i] = v[i];
                    }
                    Ok(())
                }
            },
        );

        // restore the unperturbed configuration
        model.update(uu)?;
        let stats = result?;
        self.last_iterations = stats.iterations;
        self.total_iterations += stats.iterations;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
