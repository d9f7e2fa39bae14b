use crate::StrError;
use serde::{Deserialize, Serialize};

/// Defines the quasi-Newton method used to update the inverse of the stiffness matrix
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub enum QnMethod {
    /// Full Newton: the stiffness matrix is reformed at every iteration
    FullNewton,

    /// Broyden-Fletcher-Goldfarb-Shanno (symmetric secant update)
    Bfgs,

    /// Broyden's "good" method (non-symmetric secant update)
    Broyden,

    /// Jacobian-free Newton-Krylov
    Jfnk,
}

impl QnMethod {
    /// Returns the method corresponding to a key such as "BFGS" (case-insensitive)
    pub fn from_key(key: &str) -> Result<Self, StrError> {
        match key.to_uppercase().as_str() {
            "FULL_NEWTON" | "FULL-NEWTON" | "NEWTON" => Ok(QnMethod::FullNewton),
            "BFGS" => Ok(QnMethod::Bfgs),
            "BROYDEN" => Ok(QnMethod::Broyden),
            "JFNK" => Ok(QnMethod::Jfnk),
            _ => Err("quasi-Newton method key is not available"),
        }
    }

    /// Returns the key of this method
    pub fn key(&self) -> &'static str {
        match self {
            QnMethod::FullNewton => "FULL_NEWTON",
            QnMethod::Bfgs => "BFGS",
            QnMethod::Broyden => "BROYDEN",
            QnMethod::Jfnk => "JFNK",
        }
    }
}

/// Defines the storage format of the global stiffness matrix
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub enum MatrixFormat {
    /// The matrix is symmetric
    Symmetric,

    /// The matrix is non-symmetric
    Unsymmetric,
}

/// Defines what happens when the maximum number of augmentations is reached
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum AugmentPolicy {
    /// The augmentations are considered converged (a warning is printed)
    AcceptAtMax,

    /// The time step fails
    FailAtMax,
}

/// Defines the timing categories of the nonlinear solver
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Timer {
    /// Stiffness matrix reformations, including the factorization
    Reform,

    /// Assembly of the stiffness matrix
    Stiffness,

    /// Linear system solutions
    Solve,

    /// Residual evaluations
    Residual,

    /// Updates of the model configuration
    Update,

    /// Quasi-Newton updates
    QnUpdate,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
