use super::{GlobalMatrix, LinearConstraintManager};
use crate::base::{EqId, Equation};
use crate::StrError;
use russell_lab::{Matrix, Vector};

/// Assembles element matrices into the global stiffness matrix
///
/// Given the element matrix `ke` and the equation ids `lmi` (rows) and `lmj` (columns):
///
/// * free × free entries are added to `K`
/// * free × prescribed entries are moved to the right-hand side: `fd[I] -= ke[i][j] · ui[J]`
/// * the row of a prescribed equation becomes the identity with `fd[J] = ui[J]`
/// * excluded DOFs are skipped
///
/// Contributions to the parent of a linear constraint are redistributed to its children.
pub struct Assembler<'a> {
    kk: &'a mut GlobalMatrix,
    fd: &'a mut Vector,
    ui: &'a Vector,
    lcm: &'a LinearConstraintManager,
    identity_rows: &'a mut [bool],
}

impl<'a> Assembler<'a> {
    /// Allocates a new instance
    ///
    /// # Input
    ///
    /// * `kk` -- the global stiffness matrix (already zeroed)
    /// * `fd` -- the vector collecting the prescribed contributions (already zeroed)
    /// * `ui` -- the solution increment holding the prescribed increments
    /// * `lcm` -- the linear constraints
    /// * `identity_rows` -- flags the rows that become the identity (len = neq)
    pub fn new(
        kk: &'a mut GlobalMatrix,
        fd: &'a mut Vector,
        ui: &'a Vector,
        lcm: &'a LinearConstraintManager,
        identity_rows: &'a mut [bool],
    ) -> Self {
        Assembler {
            kk,
            fd,
            ui,
            lcm,
            identity_rows,
        }
    }

    /// Assembles a square element matrix
    pub fn assemble(&mut self, lm: &[EqId], ke: &Matrix) -> Result<(), StrError> {
        self.assemble_rect(lm, lm, ke)
    }

    /// Assembles a general element matrix with distinct row and column equations
    pub fn assemble_rect(&mut self, lmi: &[EqId], lmj: &[EqId], ke: &Matrix) -> Result<(), StrError> {
        let (nrow, ncol) = ke.dims();
        if nrow != lmi.len() || ncol != lmj.len() {
            return Err("element matrix is incompatible with the equation lists");
        }
        for i in 0..nrow {
            match Equation::decode(lmi[i]) {
                Equation::Free(ii) => {
                    for j in 0..ncol {
                        let kij = ke.get(i, j);
                        match Equation::decode(lmj[j]) {
                            Equation::Free(jj) => self.add_free(ii, jj, kij)?,
                            Equation::Prescribed(jj) => self.add_prescribed(ii, jj, kij),
                            Equation::Excluded => (),
                        }
                    }
                }
                Equation::Prescribed(ii) => {
                    self.kk.set(ii, ii, 1.0)?;
                    self.fd[ii] = self.ui[ii];
                    self.identity_rows[ii] = true;
                }
                Equation::Excluded => (),
            }
        }
        Ok(())
    }

    /// Adds a value to a free × free entry
    pub fn add(&mut self, i: usize, j: usize, value: f64) -> Result<(), StrError> {
        self.add_free(i, j, value)
    }

    fn add_free(&mut self, ii: usize, jj: usize, kij: f64) -> Result<(), StrError> {
        if self.lcm.is_parent(ii) || self.lcm.is_parent(jj) {
            for (a, wa) in self.lcm.targets(ii) {
                for (b, wb) in self.lcm.targets(jj) {
                    self.kk.add(a, b, wa * wb * kij)?;
                }
            }
            Ok(())
        } else {
            self.kk.add(ii, jj, kij)
        }
    }

    fn add_prescribed(&mut self, ii: usize, jj: usize, kij: f64) {
        let value = self.ui[jj];
        if value == 0.0 || kij == 0.0 {
            return;
        }
        if self.lcm.is_parent(ii) {
            for (a, wa) in self.lcm.targets(ii) {
                self.fd[a] -= wa * kij * value;
            }
        } else {
            self.fd[ii] -= kij * value;
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
