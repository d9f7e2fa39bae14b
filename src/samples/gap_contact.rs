use crate::base::{EqId, NewtonError};
use crate::fem::{Assembler, Constraint, GlobalVector, MatrixProfile};
use crate::StrError;
use russell_lab::{Matrix, Vector};

/// Implements the contact between a set of nodes and a rigid wall
///
/// The wall blocks the motion of the nodes in the positive direction. The gap of a node
/// is positive when the node penetrates the wall:
///
/// ```text
/// g = u - wall
/// tn = ⟨λ + ε g⟩
/// ```
///
/// where `ε` is the penalty, `λ` is the Lagrange multiplier, and `⟨x⟩ = max(x, 0)`.
/// Without augmentations, the contact is enforced by the penalty method only (`λ = 0`).
/// With augmentations, the multipliers are updated with `λ ← ⟨λ + ε g⟩` until the
/// relative change of the multipliers' norm is below `altol` and the relative change of
/// the gaps' norm is below `gaptol`.
#[derive(Clone, Debug)]
pub struct GapContact {
    /// Nodes in contact with the wall
    nodes: Vec<usize>,

    /// Position of the wall (displacement at which the contact starts)
    wall: f64,

    /// Penalty ε
    penalty: f64,

    /// Enables the augmented Lagrangian iterations
    augmented: bool,

    /// Tolerance on the relative change of the multipliers' norm (0 = disabled)
    altol: f64,

    /// Tolerance on the relative change of the gaps' norm (0 = disabled)
    gaptol: f64,

    /// Min number of augmentations
    naugmin: usize,

    /// Max number of augmentations
    naugmax: usize,

    /// Lagrange multipliers (one per node)
    lambda: Vec<f64>,

    /// Gaps (one per node)
    gap: Vec<f64>,

    /// Norm of the gaps at the previous augmentation
    normg0: f64,

    /// Number of calls to augment
    pub n_augment: usize,

    /// Shows the norms at each augmentation
    pub verbose: bool,
}

impl GapContact {
    /// Allocates a new instance with the penalty method only
    pub fn new(nodes: &[usize], wall: f64, penalty: f64) -> Result<Self, StrError> {
        if nodes.is_empty() {
            return Err("the contact requires at least one node");
        }
        if penalty <= 0.0 {
            return Err("the contact penalty must be > 0.0");
        }
        let n = nodes.len();
        Ok(GapContact {
            nodes: nodes.to_vec(),
            wall,
            penalty,
            augmented: false,
            altol: 0.01,
            gaptol: 0.0,
            naugmin: 0,
            naugmax: 10,
            lambda: vec![0.0; n],
            gap: vec![0.0; n],
            normg0: 0.0,
            n_augment: 0,
            verbose: false,
        })
    }

    /// Enables the augmented Lagrangian iterations
    pub fn set_augmentation(
        &mut self,
        altol: f64,
        gaptol: f64,
        naugmin: usize,
        naugmax: usize,
    ) -> Result<&mut Self, StrError> {
        if altol < 0.0 || gaptol < 0.0 {
            return Err("the augmentation tolerances must be ≥ 0.0");
        }
        if naugmax < naugmin {
            return Err("naugmax must be ≥ naugmin");
        }
        self.augmented = true;
        self.altol = altol;
        self.gaptol = gaptol;
        self.naugmin = naugmin;
        self.naugmax = naugmax;
        Ok(self)
    }

    /// Returns the nodes in contact with the wall
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    /// Returns the gap of the i-th node
    pub fn gap(&self, i: usize) -> f64 {
        self.gap[i]
    }

    /// Returns the Lagrange multiplier of the i-th node
    pub fn multiplier(&self, i: usize) -> f64 {
        self.lambda[i]
    }

    /// Returns the contact traction of the i-th node
    pub fn traction(&self, i: usize) -> f64 {
        f64::max(self.lambda[i] + self.penalty * self.gap[i], 0.0)
    }

    /// Updates the gaps given the displacements of all nodes
    pub fn update_gaps(&mut self, u: &[f64]) {
        for (i, node) in self.nodes.iter().enumerate() {
            self.gap[i] = u[*node] - self.wall;
        }
    }

    /// Adds the equations of the contact nodes to the sparsity profile
    pub fn matrix_profile(&self, profile: &mut MatrixProfile, lm: &[EqId]) -> Result<(), StrError> {
        for node in &self.nodes {
            profile.add(&[lm[*node]])?;
        }
        Ok(())
    }

    /// Adds the contact forces to the residual
    ///
    /// `lm` holds the equation id of each node of the model.
    pub fn residual(&self, rr: &mut GlobalVector, lm: &[EqId]) -> Result<(), StrError> {
        for (i, node) in self.nodes.iter().enumerate() {
            let tn = self.traction(i);
            if tn > 0.0 {
                rr.assemble(&[lm[*node]], &Vector::from(&[-tn]))?;
            }
        }
        Ok(())
    }

    /// Adds the contact stiffness to the global matrix
    pub fn stiffness(&self, assembler: &mut Assembler, lm: &[EqId]) -> Result<(), StrError> {
        for (i, node) in self.nodes.iter().enumerate() {
            if self.lambda[i] + self.penalty * self.gap[i] > 0.0 {
                assembler.assemble(&[lm[*node]], &Matrix::from(&[[self.penalty]]))?;
            }
        }
        Ok(())
    }
}

impl Constraint for GapContact {
    fn is_active(&self) -> bool {
        self.augmented
    }

    fn augment(&mut self, naug: usize) -> Result<bool, NewtonError> {
        if !self.augmented {
            return Ok(true);
        }
        self.n_augment += 1;
        if naug == 0 {
            self.normg0 = 0.0;
        }

        // norms of the current and updated multipliers
        let mut norm_l0 = 0.0;
        let mut norm_l1 = 0.0;
        let mut updated = vec![0.0; self.nodes.len()];
        for i in 0..self.nodes.len() {
            updated[i] = self.traction(i);
            norm_l0 += self.lambda[i] * self.lambda[i];
            norm_l1 += updated[i] * updated[i];
        }
        let norm_l0 = f64::sqrt(norm_l0);
        let norm_l1 = f64::sqrt(norm_l1);

        // RMS of the penetrations
        let mut norm_g1 = 0.0;
        let mut npen = 0;
        for g in &self.gap {
            if *g > 0.0 {
                norm_g1 += g * g;
                npen += 1;
            }
        }
        let norm_g1 = f64::sqrt(norm_g1 / usize::max(npen, 1) as f64);

        let lnorm = if norm_l1 != 0.0 {
            f64::abs((norm_l1 - norm_l0) / norm_l1)
        } else {
            f64::abs(norm_l1 - norm_l0)
        };
        let gnorm = if norm_g1 != 0.0 {
            f64::abs((norm_g1 - self.normg0) / norm_g1)
        } else {
            f64::abs(norm_g1 - self.normg0)
        };

        let mut converged = true;
        if self.altol > 0.0 && lnorm > self.altol {
            converged = false;
        }
        if self.gaptol > 0.0 && gnorm > self.gaptol {
            converged = false;
        }
        if self.naugmin > naug {
            converged = false;
        }
        if self.naugmax <= naug {
            converged = true;
        }
        if self.verbose {
            println!("gap contact: ‖λ‖ change = {:.3e} (altol = {:.3e})", lnorm, self.altol);
            println!("gap contact: ‖g‖ change = {:.3e} (gaptol = {:.3e})", gnorm, self.gaptol);
        }

        if !converged {
            self.lambda = updated;
        }
        self.normg0 = norm_g1;
        Ok(converged)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::GapContact;
    use crate::fem::{Constraint, GlobalVector, LinearConstraintManager};
    use russell_lab::{approx_eq, Vector};

    #[test]
    fn new_captures_errors() {
        assert_eq!(
            GapContact::new(&[], 0.0, 1.0).err(),
            Some("the contact requires at least one node")
        );
        assert_eq!(
            GapContact::new(&[1], 0.0, 0.0).err(),
            Some("the contact penalty must be > 0.0")
        );
        let mut contact = GapContact::new(&[1], 0.0, 1.0).unwrap();
        assert_eq!(
            contact.set_augmentation(-1.0, 0.0, 0, 10).err(),
            Some("the augmentation tolerances must be ≥ 0.0")
        );
        assert_eq!(
            contact.set_augmentation(0.1, 0.0, 5, 2).err(),
            Some("naugmax must be ≥ naugmin")
        );
    }

    #[test]
    fn traction_works() {
        let mut contact = GapContact::new(&[1, 2], 1.0, 100.0).unwrap();
        contact.update_gaps(&[0.0, 1.01, 0.9]);
        approx_eq(contact.gap(0), 0.01, 1e-15);
        approx_eq(contact.traction(0), 1.0, 1e-13);
        assert_eq!(contact.traction(1), 0.0);

        // only the penetrating node contributes to the residual
        let lcm = LinearConstraintManager::new();
        let mut rr = Vector::new(2);
        let mut global = GlobalVector::new(&mut rr, &lcm);
        contact.residual(&mut global, &[-1, 0, 1]).unwrap();
        approx_eq(rr[0], -1.0, 1e-13);
        assert_eq!(rr[1], 0.0);
    }

    #[test]
    fn augment_updates_the_multipliers() {
        let mut contact = GapContact::new(&[0], 1.0, 100.0).unwrap();
        assert_eq!(contact.is_active(), false);
        assert_eq!(contact.augment(0).unwrap(), true);
        assert_eq!(contact.n_augment, 0);

        contact.set_augmentation(0.01, 0.0, 0, 10).unwrap();
        assert_eq!(contact.is_active(), true);

        // λ = 0 → 1
        contact.update_gaps(&[1.01]);
        assert_eq!(contact.augment(0).unwrap(), false);
        approx_eq(contact.multiplier(0), 1.0, 1e-13);

        // ‖λ‖ changes by 0.01 / 1.01 < altol
        contact.update_gaps(&[1.0001]);
        assert_eq!(contact.augment(1).unwrap(), true);
        approx_eq(contact.multiplier(0), 1.0, 1e-13);
        assert_eq!(contact.n_augment, 2);
    }

    #[test]
    fn augment_respects_the_min_and_max_augmentations() {
        let mut contact = GapContact::new(&[0], 1.0, 100.0).unwrap();
        contact.set_augmentation(0.01, 0.0, 2, 3).unwrap();
        contact.update_gaps(&[0.5]);
        // no contact: the norms do not change
        assert_eq!(contact.augment(0).unwrap(), false);
        assert_eq!(contact.augment(1).unwrap(), false);
        assert_eq!(contact.augment(2).unwrap(), true);

        // the multiplier keeps changing but the max has been reached
        contact.update_gaps(&[2.0]);
        assert_eq!(contact.augment(2).unwrap(), false);
        assert_eq!(contact.augment(3).unwrap(), true);
    }

    #[test]
    fn augment_checks_the_gaps() {
        let mut contact = GapContact::new(&[0, 1], 0.0, 10.0).unwrap();
        contact.set_augmentation(0.0, 0.1, 0, 10).unwrap();
        contact.update_gaps(&[0.3, 0.4]);
        // RMS of the gaps: √((0.09 + 0.16)/2) vs 0
        assert_eq!(contact.augment(0).unwrap(), false);
        contact.update_gaps(&[0.301, 0.4]);
        assert_eq!(contact.augment(1).unwrap(), true);
    }
}
