//! Conversion error types.

use thiserror::Error;

/// Result type for conversion operations.
pub type ConversionResult<T> = Result<T, ConversionError>;

/// Errors raised while translating between wire values and native values.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The binding type string is not a known [`BindingKind`](crate::BindingKind).
    #[error("unsupported binding kind: {0}")]
    UnsupportedBindingKind(String),

    /// The wire value carries no variant at all.
    #[error("missing data: expected a {expected} value")]
    MissingData { expected: &'static str },

    /// The wire value variant does not fit the requested target.
    #[error("cannot convert {found} value into {target}")]
    VariantMismatch {
        found: &'static str,
        target: String,
    },

    /// Structured (JSON) decode failed.
    #[error("cannot decode {target}: {source}")]
    Decode {
        target: String,
        #[source]
        source: serde_json::Error,
    },

    /// Structured (JSON) encode failed.
    #[error("cannot encode value: {0}")]
    Encode(#[source] serde_json::Error),

    /// A string value could not be parsed as the requested number or boolean.
    #[error("cannot parse {value:?} as {target}")]
    Parse { value: String, target: String },

    /// The HTTP request URL is not valid.
    #[error("invalid request url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The native value has no wire representation.
    #[error("{0} values cannot be sent to the host")]
    NotEncodable(String),
}

impl ConversionError {
    /// Creates a variant mismatch error.
    pub fn mismatch(found: &'static str, target: impl ToString) -> Self {
        Self::VariantMismatch {
            found,
            target: target.to_string(),
        }
    }

    /// Creates a decode error.
    pub fn decode(target: impl ToString, source: serde_json::Error) -> Self {
        Self::Decode {
            target: target.to_string(),
            source,
        }
    }

    /// Creates a parse error.
    pub fn parse(value: impl Into<String>, target: impl ToString) -> Self {
        Self::Parse {
            value: value.into(),
            target: target.to_string(),
        }
    }
}
