//! Command implementations.
//!
//! Each subcommand is implemented in its own module for clean separation.

pub(crate) mod completions;
pub(crate) mod listen;
pub(crate) mod ports;
pub(crate) mod probe;
pub(crate) mod send;
