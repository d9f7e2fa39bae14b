//! Implements the base structures for the nonlinear equation solver

mod config;
mod constants;
mod enums;
mod equations;
mod errors;
mod timers;
pub use crate::base::config::*;
pub use crate::base::constants::*;
pub use crate::base::enums::*;
pub use crate::base::equations::*;
pub use crate::base::errors::*;
pub use crate::base::timers::*;
