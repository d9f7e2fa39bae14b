use super::{evaluate_residual, FeModel, LinearConstraintManager};
use crate::base::{Config, NewtonError, LS_ZERO};
use russell_lab::{vec_inner, Vector};
use serde::{Deserialize, Serialize};

/// Implements the line search by quadratic interpolation of the energy
///
/// The merit function is the energy `r(s) = ui · R(uu + s ui)`. Starting with the full
/// step `s = 1`, the step is accepted when `|r(s) / r(0)| ≤ ls_tol`; otherwise the next
/// trial step is obtained by fitting a quadratic through the last two energies:
///
/// ```text
/// a = r(0) / r(s)     A = 1 + a (s - 1)     B = a s²     D = B² - 4 A B
///
/// s ← (B + √D) / 2A    if D ≥ 0
/// s ← B / 2A           otherwise
/// ```
///
/// After `ls_iter` unsuccessful trials, the step with the smallest energy is re-applied.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct LineSearch {
    /// Tolerance on the energy ratio (0 disables the line search)
    pub ls_tol: f64,

    /// Minimum step size
    pub ls_min: f64,

    /// Max number of interpolations
    pub ls_iter: usize,

    /// Step size of the last search
    pub last_step: f64,
}

impl LineSearch {
    /// Allocates a new instance
    pub fn new(config: &Config) -> Self {
        LineSearch {
            ls_tol: config.ls_tol,
            ls_min: config.ls_min,
            ls_iter: config.ls_iter,
            last_step: 1.0,
        }
    }

    /// Returns true if the line search is enabled
    pub fn enabled(&self) -> bool {
        self.ls_tol > 0.0
    }

    /// Searches the step along the increment `ui`
    ///
    /// On return, the model is at `uu + s ui` and `r1` holds the corresponding residual.
    ///
    /// # Input
    ///
    /// * `uu` -- the accumulated increment of the time step (before this iteration)
    /// * `ui` -- the solution increment
    /// * `r0` -- the residual used to compute `ui`
    /// * `r1` -- (output) the residual at the accepted step
    /// * `ut` -- (workspace) the trial increment
    ///
    /// Returns the step and the number of residual evaluations.
    pub fn search(
        &mut self,
        model: &mut dyn FeModel,
        lcm: &LinearConstraintManager,
        uu: &Vector,
        ui: &Vector,
        r0: &Vector,
        r1: &mut Vector,
        ut: &mut Vector,
    ) -> Result<(f64, usize), NewtonError> {
        let e0 = vec_inner(ui, r0);
        let mut s = 1.0;
        let mut s_best = s;
        let mut e_best = f64::abs(e0);
        let mut s_applied;
        let mut ntrial = 0;
        let mut ninterp = 0;
        loop {
            self.apply(s, model, lcm, uu, ui, r1, ut)?;
            s_applied = s;
            ntrial += 1;

            let e1 = vec_inner(ui, r1);
            if ninterp == 0 || f64::abs(e1) < e_best {
                s_best = s;
                e_best = f64::abs(e1);
            }

            // a (nearly) zero energy cannot be improved
            let ratio = if f64::abs(e1) < LS_ZERO || f64::abs(e0) < LS_ZERO {
                0.0
            } else {
                f64::abs(e1 / e0)
            };
            if ratio <= self.ls_tol {
                break;
            }

            if ninterp >= self.ls_iter {
                s = s_best;
                if s != s_applied {
                    self.apply(s, model, lcm, uu, ui, r1, ut)?;
                    ntrial += 1;
                }
                break;
            }

            let a = e0 / e1;
            let aa = 1.0 + a * (s - 1.0);
            let bb = a * s * s;
            let dd = bb * bb - 4.0 * aa * bb;
            s = if dd >= 0.0 {
                let mut x = (bb + f64::sqrt(dd)) / (2.0 * aa);
                if x < 0.0 {
                    x = (bb - f64::sqrt(dd)) / (2.0 * aa);
                }
                f64::max(x, 0.0)
            } else {
                0.5 * bb / aa
            };
            s = f64::min(s, 1.0);
            if !(s >= self.ls_min) {
                return Err(NewtonError::ZeroLinestepSize { step: s });
            }
            ninterp += 1;
        }
        self.last_step = s;
        Ok((s, ntrial))
    }

    /// Places the model at `uu + s ui` and computes the residual
    fn apply(
        &self,
        s: f64,
        model: &mut dyn FeModel,
        lcm: &LinearConstraintManager,
        uu: &Vector,
        ui: &Vector,
        r1: &mut Vector,
        ut: &mut Vector,
    ) -> Result<(), NewtonError> {
        for i in 0..ui.dim() {
            ut[i] = uu[i] + s * ui[i];
        }
        model.update(ut)?;
        evaluate_residual(model, r1, lcm, false)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::LineSearch;
    use crate::base::{Config, NewtonError};
    use crate::fem::testing::LinearModel;
    use crate::fem::LinearConstraintManager;
    use russell_lab::{approx_eq, Matrix, Vector};

    #[test]
    fn full_step_is_accepted_without_other_trials() {
        let kk = Matrix::from(&[[2.0, 0.0], [0.0, 4.0]]);
        let mut model = LinearModel::new(&kk, &[2.0, 4.0]);
        let lcm = LinearConstraintManager::new();
        let uu = Vector::new(2);
        let ui = Vector::from(&[1.0, 1.0]);
        let r0 = Vector::from(&[2.0, 4.0]);
        let mut r1 = Vector::new(2);
        let mut ut = Vector::new(2);
        let mut ls = LineSearch::new(&Config::new());
        let (s, ntrial) = ls.search(&mut model, &lcm, &uu, &ui, &r0, &mut r1, &mut ut).unwrap();
        assert_eq!(s, 1.0);
        assert_eq!(ntrial, 1);
        assert_eq!(model.n_update, 1);
        assert_eq!(r1.as_data(), &[0.0, 0.0]);
        assert_eq!(ls.last_step, 1.0);
    }

    #[test]
    fn overshooting_step_is_reduced() {
        // R(u) = 1 - u with the increment twice as large as needed
        let kk = Matrix::from(&[[1.0]]);
        let mut model = LinearModel::new(&kk, &[1.0]);
        let lcm = LinearConstraintManager::new();
        let uu = Vector::new(1);
        let ui = Vector::from(&[2.0]);
        let r0 = Vector::from(&[1.0]);
        let mut r1 = Vector::new(1);
        let mut ut = Vector::new(1);
        let mut ls = LineSearch::new(&Config::new());
        let (s, ntrial) = ls.search(&mut model, &lcm, &uu, &ui, &r0, &mut r1, &mut ut).unwrap();
        // e0 = 2, e(1) = -2 ⇒ a = -1, A = 1, B = -1, D = 5 ⇒ s = (-1 + √5) / 2 ≈ 0.618
        approx_eq(s, (f64::sqrt(5.0) - 1.0) / 2.0, 1e-15);
        assert_eq!(ntrial, 2);
        approx_eq(model.u()[0], 2.0 * s, 1e-15);
        approx_eq(r1[0], 1.0 - 2.0 * s, 1e-15);
    }

    #[test]
    fn search_captures_small_steps() {
        // energy increasing along the increment
        let kk = Matrix::from(&[[1.0]]);
        let mut model = LinearModel::new(&kk, &[1.0]);
        let lcm = LinearConstraintManager::new();
        let uu = Vector::new(1);
        let ui = Vector::from(&[-1.0]);
        let r0 = Vector::from(&[1.0]);
        let mut r1 = Vector::new(1);
        let mut ut = Vector::new(1);
        let mut config = Config::new();
        config.set_line_search(0.5, 0.1, 1).unwrap();
        let mut ls = LineSearch::new(&config);
        // e0 = -1, e(1) = -2 ⇒ a = 0.5, A = 1, B = 0.5, D = -1.75 ⇒ s = 0.25
        // e(0.25) = -1.25 is the smallest energy after one interpolation
        let (s, ntrial) = ls.search(&mut model, &lcm, &uu, &ui, &r0, &mut r1, &mut ut).unwrap();
        assert_eq!(s, 0.25);
        assert_eq!(ntrial, 2);

        config.set_line_search(0.5, 0.3, 5).unwrap();
        let mut ls = LineSearch::new(&config);
        assert_eq!(
            ls.search(&mut model, &lcm, &uu, &ui, &r0, &mut r1, &mut ut).err(),
            Some(NewtonError::ZeroLinestepSize { step: 0.25 })
        );
    }
}
