//! loom CLI library
//!
//! Argument definitions and command implementations for the `loom`
//! binary, exposed so they can be driven from tests.

pub mod cli;
pub mod commands;
