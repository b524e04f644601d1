//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds the configured maximum size.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: u32 },

    /// Frame payload is not a valid message.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Envelope carries a protocol version this worker does not speak.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    /// Transport failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stream ended in the middle of a frame.
    #[error("incomplete message: expected {expected} bytes, got {received}")]
    IncompleteMessage { expected: usize, received: usize },

    /// Zero-length frame.
    #[error("empty message")]
    EmptyMessage,

    /// A message arrived in a state that does not accept it.
    #[error("unexpected {kind} while {state}")]
    UnexpectedMessage { kind: &'static str, state: String },
}

impl ProtocolError {
    pub fn unexpected(kind: &'static str, state: impl ToString) -> Self {
        Self::UnexpectedMessage {
            kind,
            state: state.to_string(),
        }
    }
}
