//! Quasi-Newton equation solver core for nonlinear finite element analyses
//!
//! The crate drives each time step of a nonlinear analysis to equilibrium. The element
//! kernels, the mesh, and the boundary conditions are supplied by a model implementing
//! [fem::FeModel]; the global stiffness matrix, the residual vectors, the secant history,
//! and the augmented Lagrangian loop are owned by [fem::NewtonSolver].

/// Defines a type alias for the error type as a static string
pub type StrError = &'static str;

pub mod base;
pub mod fem;
pub mod prelude;
pub mod samples;
