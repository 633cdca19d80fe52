//! Shared utilities: the error type, macros, configuration and small
//! vector/matrix helpers.

pub mod config;
pub mod errors;
pub mod general;
pub mod macros;
