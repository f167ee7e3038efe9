//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod toml;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Hard ceiling on the number of workers a single run may launch
pub const MAX_THREADS: usize = 64;

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Requested worker count (validated against `MAX_THREADS` before launch)
    ///
    /// Kept signed so that a negative value in a config file is reported as
    /// out of range instead of as a parse failure.
    pub threads: Option<i64>,
    /// CPU cores to pin workers to (e.g. "0-3" or "0,2,4")
    pub cpu_cores: Option<String>,
    /// Upper bound of the random delay each worker waits before its work (0 = none)
    #[serde(default)]
    pub jitter_ms: u64,
    /// Base seed for per-worker jitter
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Rank that should fail (fault injection)
    pub fail_rank: Option<usize>,
    /// How the injected fault manifests
    #[serde(default)]
    pub fail_mode: FaultMode,
}

fn default_seed() -> u64 {
    0x5eed
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: None,
            cpu_cores: None,
            jitter_ms: 0,
            seed: default_seed(),
            fail_rank: None,
            fail_mode: FaultMode::default(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Write a JSON run report to this path
    pub json_output: Option<PathBuf>,
    /// Skip the final text report block
    #[serde(default)]
    pub quiet_report: bool,
}

/// Runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Print DEBUG diagnostics to stderr
    #[serde(default)]
    pub debug: bool,
    /// Give up waiting for workers after this many seconds (none = wait forever)
    pub timeout_secs: Option<u64>,
}

impl RuntimeConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Injected fault behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultMode {
    /// The task returns an error
    #[default]
    Error,
    /// The task panics
    Panic,
}

impl fmt::Display for FaultMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultMode::Error => write!(f, "error"),
            FaultMode::Panic => write!(f, "panic"),
        }
    }
}

/// Worker count rejected before any worker is launched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("'{input}' is not a number")]
    NotANumber { input: String },

    #[error("{value} is outside the allowed range 1..={max}", max = MAX_THREADS)]
    OutOfRange { value: String },

    #[error("no worker count given")]
    MissingCount,

    #[error("expected one worker count, got {given}")]
    ExtraArguments { given: usize },
}

/// A worker count that passed validation
///
/// Only obtainable through [`validator::validate`] or
/// [`validator::validate_count`], so holding one proves `0 < n <= MAX_THREADS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValidCount(usize);

impl ValidCount {
    pub(crate) fn new_unchecked(count: usize) -> Self {
        debug_assert!(count > 0 && count <= MAX_THREADS);
        Self(count)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for ValidCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
