use super::LinearConstraintManager;
use crate::base::{EqId, Equation};
use crate::StrError;
use russell_lab::Vector;

/// Assembles element vectors into the global residual vector
///
/// Prescribed and excluded DOFs are skipped. Contributions to the parent of a linear
/// constraint are redistributed to its children.
pub struct GlobalVector<'a> {
    rr: &'a mut Vector,
    lcm: &'a LinearConstraintManager,
}

impl<'a> GlobalVector<'a> {
    /// Wraps a global vector and sets all its values to zero
    pub fn new(rr: &'a mut Vector, lcm: &'a LinearConstraintManager) -> Self {
        rr.fill(0.0);
        GlobalVector { rr, lcm }
    }

    /// Returns the number of equations
    pub fn dim(&self) -> usize {
        self.rr.dim()
    }

    /// Assembles an element vector
    ///
    /// # Input
    ///
    /// * `lm` -- equation ids of the element (see [crate::base::EqId])
    /// * `fe` -- element vector with `dim = lm.len()`
    pub fn assemble(&mut self, lm: &[EqId], fe: &Vector) -> Result<(), StrError> {
        if fe.dim() != lm.len() {
            return Err("element vector is incompatible with the equation list");
        }
        for (i, l) in lm.iter().enumerate() {
            if let Equation::Free(eq) = Equation::decode(*l) {
                self.add(eq, fe[i])?;
            }
        }
        Ok(())
    }

    /// Adds a value to a free equation (e.g. a concentrated load)
    pub fn add(&mut self, eq: usize, value: f64) -> Result<(), StrError> {
        if eq >= self.rr.dim() {
            return Err("equation number is out of bounds in the global vector");
        }
        if self.lcm.is_parent(eq) {
            for (child, coef) in self.lcm.targets(eq) {
                self.rr[child] += coef * value;
            }
        } else {
            self.rr[eq] += value;
        }
        Ok(())
    }

    /// Returns the assembled vector
    pub fn as_vector(&self) -> &Vector {
        &*self.rr
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
