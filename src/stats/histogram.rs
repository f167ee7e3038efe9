//! Execution time histogram using HdrHistogram
//!
//! Tracks how long each worker ran, from nanoseconds up to one hour, with 3
//! significant digits of precision.

use hdrhistogram::Histogram;
use std::time::Duration;

const MAX_TRACKABLE_NANOS: u64 = 3_600_000_000_000;

/// Worker execution time histogram
#[derive(Debug, Clone)]
pub struct ExecutionHistogram {
    histogram: Histogram<u64>,
}

impl ExecutionHistogram {
    /// Create a new histogram covering 1ns to 1 hour
    pub fn new() -> Self {
        let histogram = Histogram::new_with_bounds(1, MAX_TRACKABLE_NANOS, 3)
            .expect("Failed to create histogram with valid bounds");

        Self { histogram }
    }

    /// Record a sample, clamped to the trackable range
    #[inline]
    pub fn record(&mut self, elapsed: Duration) {
        let nanos = elapsed.as_nanos().min(MAX_TRACKABLE_NANOS as u128) as u64;
        let _ = self.histogram.record(nanos.max(1));
    }

    /// Value at a percentile (0.0 - 100.0), or None if empty
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.value_at_percentile(percentile)))
    }

    pub fn min(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.min()))
    }

    pub fn max(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.max()))
    }

    pub fn mean(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.mean() as u64))
    }

    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.len() == 0
    }
}

impl Default for ExecutionHistogram {
    fn default() -> Self {
        Self::new()
    }
}
