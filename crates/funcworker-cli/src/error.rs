//! CLI error types.

use std::path::PathBuf;

use funcworker_core::TracingError;
use funcworker_runtime::WorkerError;
use thiserror::Error;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Invalid setting, from a flag or the config file.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Tracing(#[from] TracingError),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

impl CliError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
