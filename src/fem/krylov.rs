use crate::base::NewtonError;
use russell_lab::{vec_inner, vec_norm, Norm, Vector};

/// Holds the results of a GMRES solution
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GmresStats {
    /// Number of Krylov iterations (operator applications)
    pub iterations: usize,

    /// Final residual norm ‖b - A x‖ (estimated by the Givens rotations)
    pub residual: f64,

    /// Indicates that the relative tolerance was reached
    pub converged: bool,
}

/// Implements the restarted GMRES method with right preconditioning
///
/// Solves `A x = b` with `A` given as an operator. With right preconditioning the method
/// solves `A M⁻¹ y = b` and returns `x = M⁻¹ y`.
#[derive(Clone, Copy, Debug)]
pub struct Gmres {
    /// Max number of iterations (all restarts)
    pub max_iter: usize,

    /// Number of iterations before restarting
    pub restart: usize,

    /// Relative tolerance: ‖r‖ ≤ tol ‖b‖
    pub tol: f64,
}

impl Gmres {
    /// Allocates a new instance
    pub fn new(max_iter: usize, restart: usize, tol: f64) -> Self {
        Gmres {
            max_iter: usize::max(max_iter, 1),
            restart: usize::max(restart, 1),
            tol,
        }
    }

    /// Solves the linear system starting from x = 0
    ///
    /// # Input
    ///
    /// * `x` -- the solution (output)
    /// * `b` -- the right-hand side
    /// * `apply` -- computes `out := A v`
    /// * `precond` -- computes `out := M⁻¹ v`
    pub fn solve<A, P>(&self, x: &mut Vector, b: &Vector, mut apply: A, mut precond: P) -> Result<GmresStats, NewtonError>
    where
        A: FnMut(&Vector, &mut Vector) -> Result<(), NewtonError>,
        P: FnMut(&Vector, &mut Vector) -> Result<(), NewtonError>,
    {
        let n = b.dim();
        x.fill(0.0);
        let b_norm = vec_norm(b, Norm::Euc);
        if b_norm == 0.0 {
            return Ok(GmresStats {
                iterations: 0,
                residual: 0.0,
                converged: true,
            });
        }
        let target = self.tol * b_norm;
        let m = self.restart;
        let mut z = Vector::new(n);
        let mut w = Vector::new(n);
        let mut total = 0;
        let mut residual = b_norm;
        while total < self.max_iter {
            // r = b - A x
            let mut r = Vector::new(n);
            if total == 0 {
                for i in 0..n {
                    r[i] = b[i];
                }
            } else {
                apply(x, &mut w)?;
                for i in 0..n {
                    r[i] = b[i] - w[i];
                }
            }
            let beta = vec_norm(&r, Norm::Euc);
            residual = beta;
            if beta <= target {
                break;
            }

            // Arnoldi process with Givens rotations
            let mut basis: Vec<Vector> = Vec::with_capacity(m + 1);
            for i in 0..n {
                r[i] /= beta;
            }
            basis.push(r);
            let mut h = vec![vec![0.0; m]; m + 1];
            let mut g = vec![0.0; m + 1];
            let mut cs = vec![0.0; m];
            let mut sn = vec![0.0; m];
            g[0] = beta;
            let mut k = 0;
            for j in 0..m {
                if total >= self.max_iter {
                    break;
                }
                precond(&basis[j], &mut z)?;
                apply(&z, &mut w)?;
                for i in 0..=j {
                    h[i][j] = vec_inner(&basis[i], &w);
                    for l in 0..n {
                        w[l] -= h[i][j] * basis[i][l];
                    }
                }
                h[j + 1][j] = vec_norm(&w, Norm::Euc);
                let mut next = Vector::new(n);
                if h[j + 1][j] > f64::EPSILON * b_norm {
                    for l in 0..n {
                        next[l] = w[l] / h[j + 1][j];
                    }
                }
                basis.push(next);
                for i in 0..j {
                    let temp = cs[i] * h[i][j] + sn[i] * h[i + 1][j];
                    h[i + 1][j] = -sn[i] * h[i][j] + cs[i] * h[i + 1][j];
                    h[i][j] = temp;
                }
                let (c, s, rho) = givens_rotation(h[j][j], h[j + 1][j]);
                cs[j] = c;
                sn[j] = s;
                h[j][j] = rho;
                h[j + 1][j] = 0.0;
                g[j + 1] = -s * g[j];
                g[j] = c * g[j];
                k = j + 1;
                total += 1;
                residual = f64::abs(g[k]);
                if residual <= target {
                    break;
                }
            }

            // y = H⁻¹ g (upper triangular)
            let mut y = vec![0.0; k];
            for i in (0..k).rev() {
                let mut sum = g[i];
                for j in (i + 1)..k {
                    sum -= h[i][j] * y[j];
                }
                if h[i][i] != 0.0 {
                    y[i] = sum / h[i][i];
                }
            }

            // x += M⁻¹ V y
            let mut dy = Vector::new(n);
            for j in 0..k {
                for i in 0..n {
                    dy[i] += basis[j][i] * y[j];
                }
            }
            precond(&dy, &mut z)?;
            for i in 0..n {
                x[i] += z[i];
            }
            if residual <= target || k == 0 {
                break;
            }
        }
        Ok(GmresStats {
            iterations: total,
            residual,
            converged: residual <= target,
        })
    }
}

fn givens_rotation(a: f64, b: f64) -> (f64, f64, f64) {
    if b == 0.0 {
        (1.0, 0.0, a)
    } else if f64::abs(b) > f64::abs(a) {
        let tau = a / b;
        let s = 1.0 / f64::sqrt(1.0 + tau * tau);
        (s * tau, s, b * f64::sqrt(1.0 + tau * tau))
    } else {
        let tau = b / a;
        let c = 1.0 / f64::sqrt(1.0 + tau * tau);
        (c, c * tau, a * f64::sqrt(1.0 + tau * tau))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::Gmres;
    use crate::base::NewtonError;
    use russell_lab::{approx_eq, Matrix, Vector};

    fn mat_vec(a: &Matrix, v: &Vector, out: &mut Vector) {
        let (m, n) = a.dims();
        for i in 0..m {
            out[i] = 0.0;
            for j in 0..n {
                out[i] += a.get(i, j) * v[j];
            }
        }
    }

    #[test]
    fn solve_works() {
        let a = Matrix::from(&[[4.0, 1.0, 0.0], [2.0, 5.0, 1.0], [0.0, -1.0, 3.0]]);
        let b = Vector::from(&[5.0, 8.0, 2.0]);
        let gmres = Gmres::new(50, 10, 1e-12);
        let mut x = Vector::new(3);
        let stats = gmres
            .solve(
                &mut x,
                &b,
                |v, out| {
                    mat_vec(&a, v, out);
                    Ok(())
                },
                |v, out| {
                    for i in 0..v.dim() {
                        out[i] = v[i];
                    }
                    Ok(())
                },
            )
            .unwrap();
        assert!(stats.converged);
        assert!(stats.iterations <= 3);
        approx_eq(x[0], 1.0, 1e-10);
        approx_eq(x[1], 1.0, 1e-10);
        approx_eq(x[2], 1.0, 1e-10);
    }

    #[test]
    fn solve_with_restart_and_preconditioner_works() {
        let a = Matrix::from(&[[10.0, 1.0, 0.0, 0.0], [1.0, 8.0, 2.0, 0.0], [0.0, 2.0, 6.0, 1.0], [0.0, 0.0, 1.0, 4.0]]);
        let b = Vector::from(&[11.0, 11.0, 9.0, 5.0]);
        let gmres = Gmres::new(100, 2, 1e-12);
        let mut x = Vector::new(4);
        let stats = gmres
            .solve(
                &mut x,
                &b,
                |v, out| {
                    mat_vec(&a, v, out);
                    Ok(())
                },
                |v, out| {
                    // Jacobi
                    for i in 0..v.dim() {
                        out[i] = v[i] / a.get(i, i);
                    }
                    Ok(())
                },
            )
            .unwrap();
        assert!(stats.converged);
        for i in 0..4 {
            approx_eq(x[i], 1.0, 1e-9);
        }
    }

    #[test]
    fn solve_handles_zero_rhs_and_errors() {
        let gmres = Gmres::new(10, 5, 1e-10);
        let mut x = Vector::from(&[3.0, 3.0]);
        let b = Vector::new(2);
        let stats = gmres
            .solve(&mut x, &b, |_, _| Err(NewtonError::NanDetected), |_, _| Ok(()))
            .unwrap();
        assert_eq!(stats.iterations, 0);
        assert_eq!(x.as_data(), &[0.0, 0.0]);

        let b = Vector::from(&[1.0, 0.0]);
        let res = gmres.solve(&mut x, &b, |_, _| Err(NewtonError::NanDetected), |_, out| {
            out.fill(0.0);
            Ok(())
        });
        assert_eq!(res.err(), Some(NewtonError::NanDetected));
    }
}
