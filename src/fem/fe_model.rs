use super::{Assembler, GlobalVector, LinearConstraintManager, MatrixProfile};
use crate::base::NewtonError;
use russell_lab::Vector;

/// Defines the finite element model driven by the nonlinear solver
///
/// The model owns the element kernels, the boundary conditions, and the configuration
/// of the mesh. The solver owns the global arrays and asks the model to fill them.
///
/// # Sign and update conventions
///
/// * The residual is the out-of-balance force `R = F_ext - F_int`
/// * The solver solves `K ui = R` and accumulates `uu += s ui` during a time step
/// * [FeModel::update] receives the **accumulated** increment of the current time step and
///   must place the configuration at `start-of-step + uu`. It does not commit anything,
///   thus calling it twice with the same argument yields the same state.
pub trait FeModel {
    /// Writes the prescribed increments of the current time step into `ui`
    ///
    /// `ui` is zeroed by the solver beforehand. The increment of a prescribed DOF goes
    /// into the equation `J` encoded by its equation id (see [crate::base::EqId]).
    fn prep_step(&mut self, _ui: &mut Vector) -> Result<(), NewtonError> {
        Ok(())
    }

    /// Assembles the residual vector (out-of-balance force)
    ///
    /// The vector wrapped by `rr` is zeroed before this call. Returns false if the
    /// residual cannot be evaluated.
    fn residual(&mut self, rr: &mut GlobalVector, first_pass: bool) -> Result<bool, NewtonError>;

    /// Assembles the stiffness matrix
    ///
    /// Returns false if the stiffness matrix cannot be evaluated.
    fn stiffness_matrix(&mut self, assembler: &mut Assembler) -> Result<bool, NewtonError>;

    /// Adds the equation lists of all elements to the sparsity profile
    fn build_matrix_profile(&mut self, profile: &mut MatrixProfile) -> Result<(), NewtonError>;

    /// Places the configuration at `start-of-step + uu`
    fn update(&mut self, uu: &Vector) -> Result<(), NewtonError>;

    /// Refreshes the state (e.g. stresses) after the constraints have been augmented
    fn update_state(&mut self) -> Result<(), NewtonError> {
        Ok(())
    }

    /// Returns true if the sparsity pattern changed (e.g. new contact pairs)
    fn needs_reshape(&self) -> bool {
        false
    }

    /// Returns the constraints handled by the augmented Lagrangian loop
    ///
    /// The constraints are not augmented in a time step that converges without iterations
    /// (zero residual and no prescribed increments).
    fn constraints_mut(&mut self) -> Vec<&mut dyn Constraint> {
        Vec::new()
    }

    /// Called at the end of each iteration
    ///
    /// May return [NewtonError::ForceConversion] or [NewtonError::IterationFailure]
    /// to stop the iterations on purpose.
    fn minor_iteration(&mut self, _niter: usize) -> Result<(), NewtonError> {
        Ok(())
    }

    /// Sets the time (end of the current time step) and the time increment
    fn set_time(&mut self, _t: f64, _dt: f64) {}

    /// Commits the converged configuration as the start of the next time step
    fn accept_step(&mut self) -> Result<(), NewtonError> {
        Ok(())
    }

    /// Restores the configuration at the start of the failed time step
    fn reject_step(&mut self) {}
}

/// Defines a constraint enforced by augmented Lagrangian iterations
pub trait Constraint {
    /// Returns true if the constraint takes part in the augmentations
    fn is_active(&self) -> bool;

    /// Updates the Lagrange multipliers
    ///
    /// Returns true if the constraint is satisfied (no more augmentations needed).
    fn augment(&mut self, naug: usize) -> Result<bool, NewtonError>;
}

/// Evaluates the residual of the model into `rr` from scratch
pub(crate) fn evaluate_residual(
    model: &mut dyn FeModel,
    rr: &mut Vector,
    lcm: &LinearConstraintManager,
    first_pass: bool,
) -> Result<(), NewtonError> {
    let mut global = GlobalVector::new(rr, lcm);
    if model.residual(&mut global, first_pass)? {
        Ok(())
    } else {
        Err(NewtonError::Fatal("the residual evaluation has failed".to_string()))
    }
}
