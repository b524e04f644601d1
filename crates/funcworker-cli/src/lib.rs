//! Command-line entry point for the language worker.
//!
//! This crate provides the `funcworker` binary: flag and config-file handling,
//! the bundled sample functions, and the commands that start the worker.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod samples;

pub use cli::Cli;
pub use config::CliConfig;
pub use error::{CliError, CliResult};
