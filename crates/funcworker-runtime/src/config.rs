//! Worker configuration.

use funcworker_core::ConverterConfig;
use funcworker_protocol::DEFAULT_MAX_MESSAGE_SIZE;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration, usually assembled from the host's launch flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Host address to connect back to.
    pub host: String,

    pub port: u16,

    /// Identifier the host assigned to this worker.
    pub worker_id: String,

    /// Request id used for the stream and for worker-originated frames.
    pub request_id: String,

    /// Maximum frame size in either direction.
    pub max_message_length: u32,

    pub converter: ConverterConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            worker_id: String::new(),
            request_id: String::new(),
            max_message_length: DEFAULT_MAX_MESSAGE_SIZE,
            converter: ConverterConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Creates a configuration for the given host endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Builder: set worker id.
    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    /// Builder: set stream request id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Builder: set maximum frame size.
    pub fn with_max_message_length(mut self, max: u32) -> Self {
        self.max_message_length = max;
        self
    }

    /// Builder: set converter options.
    pub fn with_converter(mut self, converter: ConverterConfig) -> Self {
        self.converter = converter;
        self
    }

    /// `host:port` to connect to.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Checks the settings the worker cannot run without.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.host.is_empty() {
            return Err(WorkerError::config("host must not be empty"));
        }
        if self.port == 0 {
            return Err(WorkerError::config("port must be set"));
        }
        if self.worker_id.is_empty() {
            return Err(WorkerError::config("worker id must be set"));
        }
        if self.max_message_length == 0 {
            return Err(WorkerError::config("max message length must be positive"));
        }
        if !self.converter.is_valid() {
            return Err(WorkerError::config(format!(
                "max_anonymous_results must be 1 or 2, got {}",
                self.converter.max_anonymous_results
            )));
        }
        Ok(())
    }
}
