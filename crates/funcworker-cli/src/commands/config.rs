//! Configuration commands.

use crate::config::CliConfig;
use crate::error::CliResult;

/// Renders the effective configuration as TOML.
pub fn render(config: &CliConfig) -> CliResult<String> {
    Ok(toml::to_string_pretty(config)?)
}

/// Dump the effective configuration to stdout.
pub fn dump(config: &CliConfig) -> CliResult<()> {
    println!("# effective configuration");
    println!("{}", render(config)?);
    Ok(())
}

/// Validate the effective configuration.
pub fn validate(config: &CliConfig) -> CliResult<()> {
    config.tracing_config()?;
    config.worker_config()?.validate()?;
    println!("Configuration is valid.");
    Ok(())
}
