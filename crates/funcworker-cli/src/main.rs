//! funcworker entry point.

use std::process::ExitCode;

use clap::Parser;
use funcworker_core::init_tracing;

use funcworker_cli::cli::{Cli, Command, ConfigAction};
use funcworker_cli::commands;
use funcworker_cli::config::CliConfig;
use funcworker_cli::error::CliResult;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = CliConfig::for_cli(&cli)?.merge_cli(&cli);

    match cli.command {
        Some(Command::Config { action }) => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Validate => commands::config::validate(&config),
        },
        Some(Command::Functions) => commands::functions::list(),
        Some(Command::Run) | None => {
            init_tracing(config.tracing_config()?)?;
            commands::run::run(&config).await
        }
    }
}
