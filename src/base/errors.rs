use crate::StrError;

/// Errors that can occur while solving a time step
///
/// The Newton iterations propagate these errors with `?`; only
/// [crate::fem::NewtonSolver::solve_step] converts them into a pass/fail flag.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum NewtonError {
    #[error("negative jacobian was detected at element {element} at gauss point {gauss_point} (jacobian = {jacobian:e})")]
    NegativeJacobian {
        element: usize,
        gauss_point: usize,
        jacobian: f64,
    },

    #[error("max nr of reformations reached ({max_refs})")]
    MaxStiffnessReformations { max_refs: usize },

    #[error("user forced conversion; solution might not be stable")]
    ForceConversion,

    #[error("user forced iteration failure")]
    IterationFailure,

    #[error("maximum residual exceeded (norm = {norm:e})")]
    MaxResidual { norm: f64 },

    #[error("zero line step size (step = {step:e})")]
    ZeroLinestepSize { step: f64 },

    #[error("problem diverging uncontrollably (energy norm = {energy:e})")]
    EnergyDiverging { energy: f64 },

    #[error("NaN or Inf detected in the solution increment")]
    NanDetected,

    #[error("linear solver failed: {0}")]
    LinearSolverFailed(String),

    #[error("zero diagonal detected in the stiffness matrix at equations {equations:?}")]
    ZeroDiagonal { equations: Vec<usize> },

    #[error("the micro-scale problem has failed at element {element} at gauss point {gauss_point}")]
    MultiScale { element: usize, gauss_point: usize },

    #[error("running restart requested")]
    DoRunningRestart,

    #[error("max nr of iterations reached ({0})")]
    MaxIterations(usize),

    #[error("max nr of augmentations reached ({0})")]
    MaxAugmentations(usize),

    #[error("{0}")]
    Fatal(String),
}

impl NewtonError {
    /// Returns true if the error was raised on purpose by the user (minor iteration callback)
    pub fn is_user_forced(&self) -> bool {
        matches!(self, NewtonError::ForceConversion | NewtonError::IterationFailure)
    }

    pub(crate) fn linear_solver(err: StrError) -> Self {
        NewtonError::LinearSolverFailed(err.to_string())
    }
}

impl From<StrError> for NewtonError {
    fn from(err: StrError) -> Self {
        NewtonError::Fatal(err.to_string())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
