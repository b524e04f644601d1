//! Command-line interface definition.
//!
//! The host launches the worker with `--host`, `--port`, `--workerId`,
//! `--requestId` and `--grpcMaxMessageLength`; the camel-case spellings are
//! accepted as aliases.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// funcworker - language worker for a serverless functions host
#[derive(Debug, Parser)]
#[command(name = "funcworker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "FUNCWORKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Log output format: pretty, compact or json
    #[arg(long)]
    pub log_format: Option<String>,

    // --- Connection flags ---
    /// Host address to connect to [default: 127.0.0.1]
    #[arg(long)]
    pub host: Option<String>,

    /// Host port
    #[arg(long)]
    pub port: Option<u16>,

    /// Worker id assigned by the host
    #[arg(long = "worker-id", alias = "workerId")]
    pub worker_id: Option<String>,

    /// Request id for the stream
    #[arg(long = "request-id", alias = "requestId")]
    pub request_id: Option<String>,

    /// Maximum message size in bytes [default: 2147483647]
    #[arg(long = "grpc-max-message-length", alias = "grpcMaxMessageLength")]
    pub max_message_length: Option<u32>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect to the host and serve (default)
    Run,

    /// List the registered functions
    Functions,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump the effective configuration
    Dump,

    /// Validate the effective configuration
    Validate,
}
