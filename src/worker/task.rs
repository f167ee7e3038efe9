//! Units of work performed by workers
//!
//! The coordinator is agnostic to what a worker does; it only needs a
//! [`WorkerTask`]. The reference task is [`GreetingTask`], which prints one
//! identification line per worker. [`FaultInjector`] wraps any task and makes
//! a single rank fail, which is how fault isolation is exercised.

use super::WorkerAssignment;
use crate::config::FaultMode;
use crate::Result;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Work performed by a single worker
///
/// Implementations may only use the data in the assignment plus their own
/// immutable configuration. They are shared across worker threads, so any
/// internal state must be thread-safe.
pub trait WorkerTask: Send + Sync {
    /// Perform the work for one assignment
    fn perform(&self, assignment: &WorkerAssignment) -> Result<()>;

    /// Short task name for diagnostics
    fn name(&self) -> &str {
        "task"
    }
}

/// Identification line printed by the greeting task
pub fn greeting(assignment: &WorkerAssignment) -> String {
    format!(
        "Hello from thread {} of {}",
        assignment.rank, assignment.total_count
    )
}

/// Random start delay applied before a task runs
///
/// Each rank derives its own generator from the base seed, so delays are
/// reproducible per rank while still varying between ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jitter {
    pub max_ms: u64,
    pub seed: u64,
}

impl Jitter {
    pub fn new(max_ms: u64, seed: u64) -> Self {
        Self { max_ms, seed }
    }

    /// Delay for a given rank
    pub fn delay_for(&self, rank: usize) -> Duration {
        if self.max_ms == 0 {
            return Duration::ZERO;
        }
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed.wrapping_add(rank as u64));
        Duration::from_millis(rng.gen_range(0..=self.max_ms))
    }
}

/// Reference task: print an identification line to stdout
#[derive(Debug, Clone, Default)]
pub struct GreetingTask {
    jitter: Option<Jitter>,
}

impl GreetingTask {
    pub fn new() -> Self {
        Self { jitter: None }
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = Some(jitter).filter(|j| j.max_ms > 0);
        self
    }
}

impl WorkerTask for GreetingTask {
    fn perform(&self, assignment: &WorkerAssignment) -> Result<()> {
        if let Some(jitter) = self.jitter {
            thread::sleep(jitter.delay_for(assignment.rank));
        }

        // One write per line keeps lines from different workers intact
        let line = format!("{}\n", greeting(assignment));
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        out.write_all(line.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "greeting"
    }
}

/// Wraps a task and makes exactly one rank fail
pub struct FaultInjector {
    inner: Arc<dyn WorkerTask>,
    rank: usize,
    mode: FaultMode,
}

impl FaultInjector {
    pub fn new(inner: Arc<dyn WorkerTask>, rank: usize, mode: FaultMode) -> Self {
        Self { inner, rank, mode }
    }
}

impl WorkerTask for FaultInjector {
    fn perform(&self, assignment: &WorkerAssignment) -> Result<()> {
        if assignment.rank != self.rank {
            return self.inner.perform(assignment);
        }
        match self.mode {
            FaultMode::Error => anyhow::bail!("injected fault in worker {}", assignment.rank),
            FaultMode::Panic => panic!("injected panic in worker {}", assignment.rank),
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
