//! Invocation context passed to handlers that ask for one.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Host log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Information,
    Warning,
    Error,
    Critical,
    None,
}

impl LogLevel {
    /// Maps a raw level onto the host scale.
    ///
    /// Values below `Trace` become `Trace`, values above `None` become
    /// `Critical`.
    pub fn from_raw(level: i32) -> Self {
        match level {
            i32::MIN..=0 => Self::Trace,
            1 => Self::Debug,
            2 => Self::Information,
            3 => Self::Warning,
            4 => Self::Error,
            5 => Self::Critical,
            6 => Self::None,
            _ => Self::Critical,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Trace => "Trace",
            Self::Debug => "Debug",
            Self::Information => "Information",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Critical => "Critical",
            Self::None => "None",
        };
        f.write_str(name)
    }
}

/// Destination for log lines emitted by handler code.
pub trait LogSink: Send + Sync {
    fn log(&self, invocation_id: &str, level: LogLevel, message: &str);
}

/// Sink that forwards handler logs to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, invocation_id: &str, level: LogLevel, message: &str) {
        match level {
            LogLevel::Trace => tracing::trace!(invocation_id, "{message}"),
            LogLevel::Debug => tracing::debug!(invocation_id, "{message}"),
            LogLevel::Information => tracing::info!(invocation_id, "{message}"),
            LogLevel::Warning => tracing::warn!(invocation_id, "{message}"),
            LogLevel::Error | LogLevel::Critical => tracing::error!(invocation_id, "{message}"),
            LogLevel::None => {}
        }
    }
}

/// Per-invocation context: identifiers plus a logger bound to the invocation.
#[derive(Clone)]
pub struct InvocationContext {
    function_id: String,
    invocation_id: String,
    sink: Arc<dyn LogSink>,
}

impl InvocationContext {
    pub fn new(
        function_id: impl Into<String>,
        invocation_id: impl Into<String>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            function_id: function_id.into(),
            invocation_id: invocation_id.into(),
            sink,
        }
    }

    pub fn function_id(&self) -> &str {
        &self.function_id
    }

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    /// Sends a log line to the host for this invocation.
    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        self.sink.log(&self.invocation_id, level, message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Information, message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message);
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("function_id", &self.function_id)
            .field("invocation_id", &self.invocation_id)
            .finish_non_exhaustive()
    }
}

impl PartialEq for InvocationContext {
    fn eq(&self, other: &Self) -> bool {
        self.function_id == other.function_id && self.invocation_id == other.invocation_id
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Collect(Mutex<Vec<(String, LogLevel, String)>>);

    impl LogSink for Collect {
        fn log(&self, invocation_id: &str, level: LogLevel, message: &str) {
            self.0
                .lock()
                .unwrap()
                .push((invocation_id.to_string(), level, message.to_string()));
        }
    }

    #[test]
    fn raw_levels_are_clamped() {
        assert_eq!(LogLevel::from_raw(-3), LogLevel::Trace);
        assert_eq!(LogLevel::from_raw(0), LogLevel::Trace);
        assert_eq!(LogLevel::from_raw(2), LogLevel::Information);
        assert_eq!(LogLevel::from_raw(6), LogLevel::None);
        assert_eq!(LogLevel::from_raw(42), LogLevel::Critical);
    }

    #[test]
    fn context_logs_under_its_invocation() {
        let sink = Arc::new(Collect::default());
        let ctx = InvocationContext::new("fn-1", "inv-1", sink.clone());
        ctx.info("first");
        ctx.log(LogLevel::Warning, "second");

        let lines = sink.0.lock().unwrap();
        assert_eq!(
            *lines,
            vec![
                ("inv-1".to_string(), LogLevel::Information, "first".to_string()),
                ("inv-1".to_string(), LogLevel::Warning, "second".to_string()),
            ]
        );
        assert_eq!(ctx.function_id(), "fn-1");
    }

    #[test]
    fn level_names_serialize_in_pascal_case() {
        assert_eq!(
            serde_json::to_string(&LogLevel::Information).unwrap(),
            "\"Information\""
        );
        assert_eq!(LogLevel::Critical.to_string(), "Critical");
    }
}
