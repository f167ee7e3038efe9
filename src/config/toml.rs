//! TOML configuration file parsing

use super::*;
use crate::config::cli::Cli;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
///
/// The positional worker count is not merged here; it is validated on its
/// own so that a bad count takes the usage path.
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Config {
    // Worker overrides
    if let Some(jitter_ms) = cli.jitter_ms {
        config.workers.jitter_ms = jitter_ms;
    }
    if let Some(seed) = cli.seed {
        config.workers.seed = seed;
    }
    if cli.cpu_cores.is_some() {
        config.workers.cpu_cores = cli.cpu_cores.clone();
    }
    if cli.fail_rank.is_some() {
        config.workers.fail_rank = cli.fail_rank;
    }
    if let Some(mode) = cli.fail_mode {
        config.workers.fail_mode = mode.into();
    }

    // Output overrides
    if cli.json_output.is_some() {
        config.output.json_output = cli.json_output.clone();
    }
    if cli.quiet_report {
        config.output.quiet_report = true;
    }

    // Runtime overrides
    if cli.timeout.is_some() {
        config.runtime.timeout_secs = cli.timeout;
    }
    if cli.debug {
        config.runtime.debug = true;
    }

    config
}

/// Build the effective configuration from the CLI and an optional config file
pub fn load_config(cli: &Cli) -> Result<Config> {
    let base = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => Config::default(),
    };
    Ok(merge_cli_with_config(cli, base))
}
