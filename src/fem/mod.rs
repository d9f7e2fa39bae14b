//! Implements the nonlinear equation solver and its collaborators

mod assembler;
mod checkpoint;
mod control_convergence;
mod fe_model;
mod global_matrix;
mod global_vector;
mod krylov;
mod line_search;
mod linear_constraints;
mod linear_system;
mod newton_solver;
pub mod strategy;
mod time_stepper;
pub use crate::fem::assembler::*;
pub use crate::fem::checkpoint::*;
pub use crate::fem::control_convergence::*;
pub use crate::fem::fe_model::*;
pub use crate::fem::global_matrix::*;
pub use crate::fem::global_vector::*;
pub use crate::fem::krylov::*;
pub use crate::fem::line_search::*;
pub use crate::fem::linear_constraints::*;
pub use crate::fem::linear_system::*;
pub use crate::fem::newton_solver::*;
pub use crate::fem::strategy::*;
pub use crate::fem::time_stepper::*;

pub(crate) use crate::fem::fe_model::evaluate_residual;

#[cfg(test)]
pub(crate) mod testing;
