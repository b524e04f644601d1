//! Process-level logging for the worker.
//!
//! Diagnostics go to stderr through `tracing`; logs written by handler code
//! travel to the host over the stream instead (see [`crate::context`]).
//!
//! ```ignore
//! use funcworker_core::tracing::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::worker())?;
//! ```

use std::str::FromStr;

use thiserror::Error;
use tracing::{Level, Subscriber};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    prelude::*,
    registry::LookupSpan,
};

/// Errors that can occur during tracing initialization.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("failed to parse env filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),

    #[error("unknown log format {0:?} (expected pretty, compact or json)")]
    UnknownFormat(String),
}

/// Output format for worker logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    Pretty,
    /// Single-line format.
    #[default]
    Compact,
    /// One JSON object per line, for hosts that collect structured stderr.
    Json,
}

impl FromStr for TracingOutputFormat {
    type Err = TracingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(TracingError::UnknownFormat(s.to_string())),
        }
    }
}

/// Configuration for tracing initialization.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level used for the `funcworker` target when `RUST_LOG` is not set.
    pub default_level: Level,
    pub output_format: TracingOutputFormat,
    /// Include file and line.
    pub include_location: bool,
    pub include_target: bool,
    pub include_timestamp: bool,
    /// Emit span open/close events (invocation spans).
    pub include_span_events: bool,
    /// Explicit filter directive; takes precedence over `RUST_LOG`.
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::worker()
    }
}

impl TracingConfig {
    /// Settings for a worker launched by the host.
    #[must_use]
    pub fn worker() -> Self {
        Self {
            default_level: Level::INFO,
            output_format: TracingOutputFormat::Compact,
            include_location: false,
            include_target: true,
            include_timestamp: true,
            include_span_events: false,
            env_filter: None,
        }
    }

    /// Settings for `--debug`.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            default_level: Level::DEBUG,
            include_location: true,
            include_span_events: true,
            ..Self::worker()
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.output_format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter directive used when neither `env_filter` nor `RUST_LOG` is set.
    pub fn default_directive(&self) -> String {
        format!("funcworker={}", self.default_level)
    }

    fn build_filter(&self) -> Result<EnvFilter, TracingError> {
        if let Some(ref filter) = self.env_filter {
            return Ok(EnvFilter::try_new(filter)?);
        }
        Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_directive())))
    }
}

/// Installs the global subscriber. Call once, before connecting to the host.
///
/// # Errors
///
/// Fails if a global subscriber is already installed or if the filter
/// directive does not parse.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let subscriber = tracing_subscriber::registry()
        .with(config.build_filter()?)
        .with(config.layer());
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

impl TracingConfig {
    fn layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    {
        let span_events = if self.include_span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(self.include_location)
            .with_line_number(self.include_location)
            .with_target(self.include_target)
            .with_span_events(span_events);

        match (self.output_format, self.include_timestamp) {
            (TracingOutputFormat::Pretty, _) => layer.pretty().boxed(),
            (TracingOutputFormat::Compact, true) => layer.compact().boxed(),
            (TracingOutputFormat::Compact, false) => layer.compact().without_time().boxed(),
            (TracingOutputFormat::Json, _) => layer.json().with_current_span(true).boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_defaults() {
        let config = TracingConfig::default();
        assert_eq!(config.default_level, Level::INFO);
        assert_eq!(config.output_format, TracingOutputFormat::Compact);
        assert!(!config.include_span_events);
        assert_eq!(config.default_directive(), "funcworker=INFO");
    }

    #[test]
    fn debug_enables_spans_and_location() {
        let config = TracingConfig::debug();
        assert_eq!(config.default_level, Level::DEBUG);
        assert!(config.include_location);
        assert!(config.include_span_events);
        assert_eq!(config.output_format, TracingOutputFormat::Compact);
    }

    #[test]
    fn builders() {
        let config = TracingConfig::worker()
            .with_level(Level::WARN)
            .with_format(TracingOutputFormat::Json)
            .with_env_filter("funcworker_runtime=trace");

        assert_eq!(config.default_level, Level::WARN);
        assert_eq!(config.output_format, TracingOutputFormat::Json);
        assert_eq!(config.env_filter.as_deref(), Some("funcworker_runtime=trace"));
    }

    #[test]
    fn explicit_filter_must_parse() {
        let config = TracingConfig::worker().with_env_filter("funcworker=loud");
        assert!(matches!(config.build_filter(), Err(TracingError::EnvFilter(_))));
    }

    #[test]
    fn parses_output_formats() {
        assert_eq!("JSON".parse::<TracingOutputFormat>().unwrap(), TracingOutputFormat::Json);
        assert_eq!(
            "pretty".parse::<TracingOutputFormat>().unwrap(),
            TracingOutputFormat::Pretty
        );
        assert!("xml".parse::<TracingOutputFormat>().is_err());
    }
}
