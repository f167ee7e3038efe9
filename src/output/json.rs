//! JSON output formatting
//!
//! Serializes a finished run into a self-describing report: host, timestamps,
//! counts, every failure, and worker execution time percentiles.

use crate::coordinator::RunSummary;
use crate::util::time::format_duration;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        Self {
            micros: d.as_micros() as u64,
            human: format_duration(d),
        }
    }
}

/// A failed worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonFailure {
    pub rank: usize,
    pub cause: String,
}

/// Worker execution time percentiles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonTiming {
    pub min: JsonDuration,
    pub mean: JsonDuration,
    pub max: JsonDuration,
    pub p50: JsonDuration,
    pub p99: JsonDuration,
}

/// Complete run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub host: String,
    /// RFC 3339 timestamp of the start of the run
    pub started_at: String,
    /// RFC 3339 timestamp of the end of the run
    pub finished_at: String,
    /// "all_succeeded" or "partial_failure"
    pub outcome: String,
    pub requested: usize,
    pub launched: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failures: Vec<JsonFailure>,
    pub elapsed: JsonDuration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<JsonTiming>,
    pub available_cpus: usize,
}

impl RunReport {
    /// Build a report for a finished run
    pub fn from_summary(summary: &RunSummary) -> Self {
        let finished_at = summary.started_at
            + chrono::Duration::from_std(summary.elapsed).unwrap_or_else(|_| chrono::Duration::zero());

        let timing = summary.stats.timing_summary().map(|t| JsonTiming {
            min: JsonDuration::from_duration(t.min),
            mean: JsonDuration::from_duration(t.mean),
            max: JsonDuration::from_duration(t.max),
            p50: JsonDuration::from_duration(t.p50),
            p99: JsonDuration::from_duration(t.p99),
        });

        Self {
            host: get_host_id(),
            started_at: summary.started_at.to_rfc3339(),
            finished_at: finished_at.to_rfc3339(),
            outcome: if summary.outcome.is_success() {
                "all_succeeded".to_string()
            } else {
                "partial_failure".to_string()
            },
            requested: summary.requested,
            launched: summary.launched,
            completed: summary.completed,
            succeeded: summary.succeeded(),
            failures: summary
                .outcome
                .failures()
                .iter()
                .map(|f| JsonFailure { rank: f.rank, cause: f.cause.to_string() })
                .collect(),
            elapsed: JsonDuration::from_duration(summary.elapsed),
            timing,
            available_cpus: num_cpus::get(),
        }
    }
}

/// Host identifier for reports
fn get_host_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Write a run report as pretty-printed JSON
pub fn write_json_report(output_path: &Path, report: &RunReport) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON report: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)
        .with_context(|| format!("Failed to write JSON report: {}", output_path.display()))?;
    writer.flush()?;
    Ok(())
}
