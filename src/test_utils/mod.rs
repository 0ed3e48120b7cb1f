//! Shared helpers for the unit tests of every module.
mod common;
mod fixtures;

pub use common::*;
pub use fixtures::*;
