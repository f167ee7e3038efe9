//! Run statistics
//!
//! Collected by the coordinator's aggregation loop from completion messages.
//! Workers never touch these; each completion carries its own elapsed time.

pub mod histogram;

use crate::worker::Completion;
use histogram::ExecutionHistogram;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Statistics for one coordinator run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    execution: ExecutionHistogram,
    succeeded: u64,
    failed: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one worker completion
    pub fn record(&mut self, completion: &Completion) {
        self.execution.record(completion.elapsed);
        if completion.outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Number of completions that actually arrived
    pub fn reported(&self) -> u64 {
        self.succeeded + self.failed
    }

    pub fn execution(&self) -> &ExecutionHistogram {
        &self.execution
    }

    /// Execution time summary, or None if no worker reported
    pub fn timing_summary(&self) -> Option<TimingSummary> {
        let hist = &self.execution;
        Some(TimingSummary {
            min: hist.min()?,
            mean: hist.mean()?,
            max: hist.max()?,
            p50: hist.percentile(50.0)?,
            p99: hist.percentile(99.0)?,
        })
    }
}

/// Worker execution time percentiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingSummary {
    pub min: Duration,
    pub mean: Duration,
    pub max: Duration,
    pub p50: Duration,
    pub p99: Duration,
}
