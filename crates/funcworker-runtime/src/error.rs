//! Runtime error types.

use std::io;
use std::path::PathBuf;

use funcworker_core::{ConversionError, TypeShape};
use funcworker_protocol::ProtocolError;
use thiserror::Error;

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that stop the worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// IO error (connect, socket).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Session-fatal protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl WorkerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Which half of a signature an arity check concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Parameters,
    Results,
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parameters => f.write_str("parameters"),
            Self::Results => f.write_str("results"),
        }
    }
}

/// Reasons a function cannot be loaded. Reported in the load response; the
/// session keeps serving.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no handler registered for {name} (entry point {entry_point})")]
    HandlerNotFound { name: String, entry_point: String },

    #[error("handler declares {declared} {slot} but the source lists {discovered}")]
    ArityMismatch {
        slot: Slot,
        declared: usize,
        discovered: usize,
    },

    #[error("duplicate parameter name {0:?}")]
    DuplicateName(String),

    #[error("at most one invocation context parameter is allowed")]
    MultipleContexts,

    #[error("output binding {name:?} has shape {shape}, which cannot be allocated")]
    UnallocatableOutput { name: String, shape: TypeShape },

    #[error("error result must be the last result (found at position {position})")]
    ErrorNotLast { position: usize },

    #[error("cannot read manifest {}: {source}", path.display())]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse manifest {}: {source}", path.display())]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("entry point {entry_point:?} not found in {source_ref}")]
    UnknownEntryPoint {
        entry_point: String,
        source_ref: String,
    },
}

impl LoadError {
    pub fn handler_not_found(name: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self::HandlerNotFound {
            name: name.into(),
            entry_point: entry_point.into(),
        }
    }

    pub fn unknown_entry_point(
        entry_point: impl Into<String>,
        source_ref: impl Into<String>,
    ) -> Self {
        Self::UnknownEntryPoint {
            entry_point: entry_point.into(),
            source_ref: source_ref.into(),
        }
    }
}

/// Reasons a single invocation fails. The message becomes the exception
/// text of the failed response.
#[derive(Debug, Error)]
pub enum InvocationFailure {
    #[error("function {0} is not loaded")]
    FunctionNotLoaded(String),

    #[error("{0}")]
    BindingResolution(String),

    #[error("cannot convert binding {name}: {source}")]
    Conversion {
        name: String,
        #[source]
        source: ConversionError,
    },

    /// Error text returned by the handler, verbatim.
    #[error("{0}")]
    Handler(String),

    #[error("{0}")]
    Schema(String),

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error("response exceeds max message length: {size} bytes (max: {max})")]
    ResponseTooLarge { size: usize, max: u32 },
}

impl InvocationFailure {
    pub fn conversion(name: impl Into<String>, source: ConversionError) -> Self {
        Self::Conversion {
            name: name.into(),
            source,
        }
    }
}
