//! Makes available common structures needed to solve a nonlinear problem
//!
//! You may write `use fenewton::prelude::*` in your code and obtain
//! access to commonly used functionality.

pub use crate::base::{encode_prescribed, AugmentPolicy, Config, EqId, MatrixFormat, NewtonError, QnMethod};
pub use crate::base::{DEFAULT_TEST_DIR, EXCLUDED};
pub use crate::fem::{Assembler, Constraint, FeModel, GlobalVector, LinearConstraint, MatrixProfile};
pub use crate::fem::{Checkpoint, DenseSolver, LinearSolver, NewtonSolver, SparseSolver, TimeStepper};
pub use crate::fem::{NewtonStrategy, QnStrategy, SolverCounters};
pub use crate::samples::{GapContact, SpringChain};
