//! Command implementations.

pub mod config;
pub mod functions;
pub mod run;
