//! Shared helpers for the unit tests of every module
mod common;
mod loopback;

pub use common::*;
pub use loopback::*;
