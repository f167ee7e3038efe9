//! Configuration validation

use super::cli::Cli;
use super::*;
use crate::worker::affinity::parse_cpu_list;
use anyhow::{Context, Result};
use std::num::IntErrorKind;

/// Validate a worker count given as text (typically the positional CLI argument)
///
/// Fails with `NotANumber` when the input is not an integer, and with
/// `OutOfRange` when it is not in `1..=MAX_THREADS`. Integers too large for
/// 64 bits are out of range, not "not a number".
pub fn validate(input: &str) -> std::result::Result<ValidCount, ConfigError> {
    let trimmed = input.trim();
    match trimmed.parse::<i64>() {
        Ok(value) => validate_count(value),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                Err(ConfigError::OutOfRange { value: trimmed.to_string() })
            }
            _ => Err(ConfigError::NotANumber { input: input.to_string() }),
        },
    }
}

/// Validate a numeric worker count
pub fn validate_count(value: i64) -> std::result::Result<ValidCount, ConfigError> {
    if value <= 0 || value > MAX_THREADS as i64 {
        return Err(ConfigError::OutOfRange { value: value.to_string() });
    }
    Ok(ValidCount::new_unchecked(value as usize))
}

/// Resolve the worker count for a run
///
/// The positional argument wins over `workers.threads` from the config file.
/// Only the count is looked at, so a bad count is reported here even when other
/// options are invalid too.
pub fn resolve_count(cli: &Cli, config: &Config) -> std::result::Result<ValidCount, ConfigError> {
    if cli.has_extra_args() {
        return Err(ConfigError::ExtraArguments { given: cli.threads.len() });
    }
    match (cli.thread_arg(), config.workers.threads) {
        (Some(arg), _) => validate(arg),
        (None, Some(threads)) => validate_count(threads),
        (None, None) => Err(ConfigError::MissingCount),
    }
}

/// Warn when `fail_rank` names a worker that will not exist
///
/// Returns true if the fault can be injected.
pub fn check_fail_rank(workers: &WorkerConfig, count: ValidCount) -> bool {
    match workers.fail_rank {
        Some(rank) if rank >= count.get() => {
            eprintln!(
                "Warning: fail_rank {} is not below the worker count {}, no fault will be injected",
                rank, count
            );
            false
        }
        Some(_) => true,
        None => false,
    }
}

/// Validate everything except the worker count
///
/// The count is handled separately so that a bad count can take the usage
/// path while other configuration mistakes are reported as errors.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_workers(&config.workers)?;
    validate_runtime(&config.runtime)?;
    Ok(())
}

/// Validate worker configuration
pub fn validate_workers(workers: &WorkerConfig) -> Result<()> {
    if let Some(ref cores) = workers.cpu_cores {
        parse_cpu_list(cores).context("Invalid cpu_cores")?;
    }

    if workers.jitter_ms > 60_000 {
        anyhow::bail!("jitter_ms must be at most 60000, got {}", workers.jitter_ms);
    }

    Ok(())
}

/// Validate runtime configuration
pub fn validate_runtime(runtime: &RuntimeConfig) -> Result<()> {
    if runtime.timeout_secs == Some(0) {
        anyhow::bail!("timeout must be at least 1 second");
    }
    Ok(())
}
