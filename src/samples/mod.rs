//! Implements sample models used by the tests and the demo program

mod gap_contact;
mod spring_chain;
pub use crate::samples::gap_contact::*;
pub use crate::samples::spring_chain::*;
