//! CLI argument parsing using clap

use super::FaultMode;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// How an injected fault manifests
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FailMode {
    /// The worker's task returns an error
    Error,
    /// The worker's task panics
    Panic,
}

impl From<FailMode> for FaultMode {
    fn from(mode: FailMode) -> Self {
        match mode {
            FailMode::Error => FaultMode::Error,
            FailMode::Panic => FaultMode::Panic,
        }
    }
}

/// threadfan - launch a bounded set of worker threads and join their outcomes
#[derive(Parser, Debug)]
#[command(name = "threadfan")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Number of worker threads (1-64)
    ///
    /// Collected as raw text so that missing, extra, and malformed values all
    /// take the same usage path.
    #[arg(value_name = "THREADS")]
    pub threads: Vec<String>,

    /// TOML configuration file (CLI options take precedence)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write a JSON run report to this file
    #[arg(long, value_name = "FILE")]
    pub json_output: Option<PathBuf>,

    /// Skip the final report block
    #[arg(long)]
    pub quiet_report: bool,

    // === Worker Options ===
    /// Maximum random delay (ms) each worker waits before its work
    #[arg(long)]
    pub jitter_ms: Option<u64>,

    /// Seed for the per-worker jitter
    #[arg(long)]
    pub seed: Option<u64>,

    /// CPU cores to pin workers to (e.g. "0-3", "0,2,4"); rank r uses core r mod len
    #[arg(long)]
    pub cpu_cores: Option<String>,

    /// Inject a fault into the worker with this rank
    #[arg(long)]
    pub fail_rank: Option<usize>,

    /// How the injected fault manifests
    #[arg(long, value_enum)]
    pub fail_mode: Option<FailMode>,

    // === Runtime Options ===
    /// Stop waiting for workers after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print debug diagnostics to stderr
    #[arg(long, env = "THREADFAN_DEBUG")]
    pub debug: bool,
}

impl Cli {
    /// Parse CLI arguments from the process environment
    pub fn try_parse_args() -> Result<Self, clap::Error> {
        Self::try_parse()
    }

    /// Positional worker count, if one was given
    pub fn thread_arg(&self) -> Option<&str> {
        self.threads.first().map(String::as_str)
    }

    /// True when more than one positional argument was supplied
    pub fn has_extra_args(&self) -> bool {
        self.threads.len() > 1
    }
}
