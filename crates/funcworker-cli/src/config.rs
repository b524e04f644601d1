//! Worker configuration file.
//!
//! An optional TOML file supplies connection defaults, converter options and
//! logging settings. Command-line flags override the file.
//!
//! ```toml
//! [worker]
//! host = "127.0.0.1"
//! port = 50051
//!
//! [converter]
//! primary_field = "first_untagged"
//! max_anonymous_results = 2
//!
//! [logging]
//! level = "debug"
//! format = "json"
//!
//! [functions]
//! inspector = "manifest"
//! ```

use std::path::Path;
use std::str::FromStr;

use funcworker_core::{ConverterConfig, TracingConfig, TracingOutputFormat};
use funcworker_protocol::DEFAULT_MAX_MESSAGE_SIZE;
use funcworker_runtime::WorkerConfig;
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::cli::Cli;
use crate::error::{CliError, CliResult};

const DEFAULT_HOST: &str = "127.0.0.1";

/// Contents of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub worker: WorkerSettings,
    pub converter: ConverterConfig,
    pub logging: LoggingSettings,
    pub functions: FunctionSettings,
}

/// Connection settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_message_length: Option<u32>,
}

/// Process log settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Level for the worker crates when `RUST_LOG` is unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// pretty, compact or json.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Full filter directive, overriding `level` and `RUST_LOG`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// Where parameter names come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectorKind {
    /// Call sites registered alongside the handlers.
    #[default]
    Static,
    /// A TOML manifest in each function directory.
    Manifest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionSettings {
    pub inspector: InspectorKind,
}

impl CliConfig {
    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| CliError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the file named by `--config`, or defaults.
    pub fn for_cli(cli: &Cli) -> CliResult<Self> {
        match cli.config {
            Some(ref path) => Self::load_from(path),
            None => Ok(Self::default()),
        }
    }

    /// Applies command-line overrides.
    pub fn merge_cli(mut self, cli: &Cli) -> Self {
        let worker = &mut self.worker;
        if let Some(ref host) = cli.host {
            worker.host = Some(host.clone());
        }
        if cli.port.is_some() {
            worker.port = cli.port;
        }
        if let Some(ref id) = cli.worker_id {
            worker.worker_id = Some(id.clone());
        }
        if let Some(ref id) = cli.request_id {
            worker.request_id = Some(id.clone());
        }
        if cli.max_message_length.is_some() {
            worker.max_message_length = cli.max_message_length;
        }
        if cli.debug {
            self.logging.level = Some(Level::DEBUG.to_string());
        }
        if let Some(ref format) = cli.log_format {
            self.logging.format = Some(format.clone());
        }
        self
    }

    /// Builds the worker configuration.
    pub fn worker_config(&self) -> CliResult<WorkerConfig> {
        if !self.converter.is_valid() {
            return Err(CliError::config(format!(
                "converter.max_anonymous_results must be 1 or 2, got {}",
                self.converter.max_anonymous_results
            )));
        }

        let worker = &self.worker;
        let mut config = WorkerConfig::new(
            worker.host.as_deref().unwrap_or(DEFAULT_HOST),
            worker.port.unwrap_or_default(),
        )
        .with_max_message_length(worker.max_message_length.unwrap_or(DEFAULT_MAX_MESSAGE_SIZE))
        .with_converter(self.converter.clone());

        if let Some(ref id) = worker.worker_id {
            config = config.with_worker_id(id);
        }
        if let Some(ref id) = worker.request_id {
            config = config.with_request_id(id);
        }
        Ok(config)
    }

    /// Builds the tracing configuration.
    pub fn tracing_config(&self) -> CliResult<TracingConfig> {
        let level = match self.logging.level.as_deref() {
            Some(level) => Level::from_str(level)
                .map_err(|_| CliError::config(format!("unknown log level {level:?}")))?,
            None => Level::INFO,
        };

        let mut config = if level == Level::DEBUG || level == Level::TRACE {
            TracingConfig::debug().with_level(level)
        } else {
            TracingConfig::worker().with_level(level)
        };
        if let Some(ref format) = self.logging.format {
            config = config.with_format(TracingOutputFormat::from_str(format)?);
        }
        if let Some(ref filter) = self.logging.filter {
            config = config.with_env_filter(filter);
        }
        Ok(config)
    }
}
