//! Human-readable text output

use crate::coordinator::{AggregateOutcome, RunSummary};
use crate::util::time::format_duration;
use std::fmt::Write;

const RULE: &str = "═══════════════════════════════════════════════════════════";

/// One-line verdict for a run
pub fn outcome_line(summary: &RunSummary) -> String {
    match summary.outcome {
        AggregateOutcome::AllSucceeded => {
            format!("All {} workers completed successfully", summary.requested)
        }
        AggregateOutcome::PartialFailure(ref failures) => format!(
            "{} of {} workers failed",
            failures.len(),
            summary.requested
        ),
    }
}

/// Render the final run report
pub fn render_report(summary: &RunSummary) -> String {
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "                      RUN SUMMARY");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Workers:   {} requested, {} launched, {} completed",
        summary.requested, summary.launched, summary.completed);
    let _ = writeln!(out, "Succeeded: {}", summary.succeeded());
    let _ = writeln!(out, "Failed:    {}", summary.outcome.failures().len());
    let _ = writeln!(out, "Elapsed:   {}", format_duration(summary.elapsed));

    if let Some(timing) = summary.stats.timing_summary() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Worker execution time:");
        let _ = writeln!(out, "  Min:    {}", format_duration(timing.min));
        let _ = writeln!(out, "  Mean:   {}", format_duration(timing.mean));
        let _ = writeln!(out, "  Max:    {}", format_duration(timing.max));
        let _ = writeln!(out, "  p50:    {}", format_duration(timing.p50));
        let _ = writeln!(out, "  p99:    {}", format_duration(timing.p99));
    }

    let failures = summary.outcome.failures();
    if !failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Failures:");
        for failure in failures {
            let _ = writeln!(out, "  {}", failure);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Result: {}", outcome_line(summary));
    let _ = writeln!(out, "{}", RULE);
    out
}

/// Print the final run report to stdout
pub fn print_report(summary: &RunSummary) {
    print!("{}", render_report(summary));
}
