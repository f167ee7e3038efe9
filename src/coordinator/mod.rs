//! Coordinator module
//!
//! Validates the requested worker count, fans out one thread per worker, and
//! fans the outcomes back in over a single multiplexed completion channel.
//!
//! # Run phases
//!
//! 1. **Validation**: the count must satisfy `0 < n <= MAX_THREADS`; on failure
//!    nothing is spawned
//! 2. **Spawn**: `n` workers with ranks `0..n`, each owning its assignment and
//!    a sender clone
//! 3. **Aggregation**: the calling thread blocks on the channel and tallies
//!    outcomes in arrival order until every launched worker has reported
//! 4. **Join**: every worker handle is joined before the run returns
//!
//! A failed worker never stops the run early; all workers reach a terminal
//! state and every failure is surfaced in the final `AggregateOutcome`.
//!
//! # Example
//!
//! ```
//! use threadfan::coordinator::{AggregateOutcome, Coordinator};
//! use threadfan::config::validator::validate;
//! use threadfan::worker::task::GreetingTask;
//! use std::sync::Arc;
//!
//! let coordinator = Coordinator::new(Arc::new(GreetingTask::new()));
//! let count = validate("4").unwrap();
//! assert_eq!(coordinator.run(count), AggregateOutcome::AllSucceeded);
//! ```

pub mod state;

use crate::config::validator;
use crate::config::{Config, ConfigError, ValidCount};
use crate::stats::RunStats;
use crate::worker::affinity::{core_for_rank, parse_cpu_list};
use crate::worker::task::{FaultInjector, GreetingTask, Jitter, WorkerTask};
use crate::worker::{Completion, Failure, Worker, WorkerAssignment, WorkerFault, WorkerOutcome};
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use state::CoordinatorState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Line printed once per run before any worker is spawned
pub const STARTUP_LINE: &str = "Hello from the main thread";

/// Combined result of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateOutcome {
    AllSucceeded,
    /// Every failure observed, ordered by rank
    PartialFailure(Vec<Failure>),
}

impl AggregateOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AggregateOutcome::AllSucceeded)
    }

    pub fn failures(&self) -> &[Failure] {
        match self {
            AggregateOutcome::AllSucceeded => &[],
            AggregateOutcome::PartialFailure(failures) => failures,
        }
    }

    /// Process exit status for this outcome: 0 when every worker succeeded, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// Everything known about a finished run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcome: AggregateOutcome,
    pub requested: usize,
    pub launched: usize,
    pub completed: usize,
    pub stats: RunStats,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.completed - self.outcome.failures().len()
    }
}

/// Fan-out/fan-in coordinator
pub struct Coordinator {
    task: Arc<dyn WorkerTask>,
    cpu_cores: Vec<usize>,
    timeout: Option<Duration>,
    debug: bool,
    spawned: AtomicUsize,
}

impl Coordinator {
    /// Create a coordinator that runs `task` in every worker
    pub fn new(task: Arc<dyn WorkerTask>) -> Self {
        Self {
            task,
            cpu_cores: Vec::new(),
            timeout: None,
            debug: false,
            spawned: AtomicUsize::new(0),
        }
    }

    /// Build a coordinator running the greeting task as configured
    pub fn from_config(config: &Config) -> Result<Self> {
        let workers = &config.workers;

        let mut task: Arc<dyn WorkerTask> = Arc::new(
            GreetingTask::new().with_jitter(Jitter::new(workers.jitter_ms, workers.seed)),
        );
        if let Some(rank) = workers.fail_rank {
            task = Arc::new(FaultInjector::new(task, rank, workers.fail_mode));
        }

        let cpu_cores = match workers.cpu_cores {
            Some(ref spec) => parse_cpu_list(spec).context("Invalid cpu_cores")?,
            None => Vec::new(),
        };

        Ok(Self::new(task)
            .with_cpu_cores(cpu_cores)
            .with_timeout(config.runtime.timeout())
            .with_debug(config.runtime.debug))
    }

    /// Pin worker rank `r` to `cores[r % cores.len()]` (empty = no pinning)
    pub fn with_cpu_cores(mut self, cores: Vec<usize>) -> Self {
        self.cpu_cores = cores;
        self
    }

    /// Stop waiting for workers after `timeout` (None = wait indefinitely)
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Total worker threads spawned by this coordinator across all runs
    pub fn workers_spawned(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Validate a textual count and run; nothing is spawned if validation fails
    pub fn launch(&self, input: &str) -> std::result::Result<RunSummary, ConfigError> {
        let count = validator::validate(input)?;
        Ok(self.run_detailed(count))
    }

    /// Run `count` workers and return the aggregate outcome
    pub fn run(&self, count: ValidCount) -> AggregateOutcome {
        self.run_detailed(count).outcome
    }

    /// Run `count` workers and return the full run summary
    pub fn run_detailed(&self, count: ValidCount) -> RunSummary {
        let n = count.get();
        let started_at = Utc::now();
        let start = Instant::now();

        println!("{}", STARTUP_LINE);

        // Each worker sends exactly once, so a channel of capacity n never blocks a sender
        let (tx, rx) = channel::bounded::<Completion>(n);
        let mut state = CoordinatorState::new(n);
        let mut handles: Vec<(usize, JoinHandle<()>)> = Vec::with_capacity(n);

        for rank in 0..n {
            let worker = Worker::new(WorkerAssignment::new(rank, n), Arc::clone(&self.task))
                .with_core(core_for_rank(&self.cpu_cores, rank))
                .with_debug(self.debug);
            let tx = tx.clone();

            let spawned = thread::Builder::new()
                .name(format!("worker-{}", rank))
                .spawn(move || worker.run_and_report(&tx));

            state.record_launch();
            match spawned {
                Ok(handle) => {
                    self.spawned.fetch_add(1, Ordering::Relaxed);
                    handles.push((rank, handle));
                }
                Err(e) => {
                    eprintln!("Warning: failed to spawn worker {}: {}", rank, e);
                    state.record(WorkerOutcome::failure(rank, WorkerFault::Spawn(e.to_string())));
                }
            }
        }

        // Only worker threads hold senders now; a disconnect means they are all gone
        drop(tx);

        if self.debug {
            eprintln!(
                "DEBUG: launched {} of {} '{}' workers ({} running)",
                state.launched(),
                state.requested(),
                self.task.name(),
                handles.len()
            );
        }

        let mut stats = RunStats::new();
        let abandoned = self.aggregate(&rx, &mut state, &mut stats);
        self.join(handles, &abandoned);

        let launched = state.launched();
        let completed = state.completed();
        let outcome = state.into_outcome();

        if self.debug {
            eprintln!(
                "DEBUG: run finished in {:?}: {} completed, {} failed",
                start.elapsed(),
                completed,
                outcome.failures().len()
            );
        }

        RunSummary {
            outcome,
            requested: n,
            launched,
            completed,
            stats,
            started_at,
            elapsed: start.elapsed(),
        }
    }

    /// Tally completions until the run is terminal
    ///
    /// Returns the ranks that never reported because the wait timed out.
    fn aggregate(
        &self,
        rx: &Receiver<Completion>,
        state: &mut CoordinatorState,
        stats: &mut RunStats,
    ) -> Vec<usize> {
        let deadline = self.timeout.map(|t| Instant::now() + t);

        while !state.is_terminal() {
            let received = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    rx.recv_timeout(remaining).map_err(|e| match e {
                        RecvTimeoutError::Timeout => WorkerFault::TimedOut,
                        RecvTimeoutError::Disconnected => WorkerFault::ChannelClosed,
                    })
                }
                None => rx.recv().map_err(|_| WorkerFault::ChannelClosed),
            };

            match received {
                Ok(completion) => {
                    let rank = completion.outcome.rank();
                    let failed = !completion.outcome.is_success();
                    stats.record(&completion);
                    let recorded = state.record(completion.outcome);
                    if self.debug {
                        if !recorded {
                            eprintln!("DEBUG: ignoring duplicate outcome for worker {}", rank);
                        } else if failed {
                            eprintln!(
                                "DEBUG: worker {} failed ({} of {} reported so far failed)",
                                rank,
                                state.failed().len(),
                                state.completed()
                            );
                        }
                    }
                }
                Err(cause) => {
                    let timed_out = cause == WorkerFault::TimedOut;
                    let ranks = state.fail_unreported(cause);
                    eprintln!(
                        "Warning: {} worker(s) did not report ({}): {:?}",
                        ranks.len(),
                        if timed_out { "timed out" } else { "channel closed" },
                        ranks
                    );
                    return if timed_out { ranks } else { Vec::new() };
                }
            }
        }

        Vec::new()
    }

    /// Join worker threads; still-running workers that timed out are detached
    fn join(&self, handles: Vec<(usize, JoinHandle<()>)>, abandoned: &[usize]) {
        for (rank, handle) in handles {
            if abandoned.contains(&rank) && !handle.is_finished() {
                if self.debug {
                    eprintln!("DEBUG: detaching worker {} (still running after timeout)", rank);
                }
                continue;
            }
            if handle.join().is_err() {
                eprintln!("Warning: worker {} thread panicked outside its task", rank);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FaultMode;
    use crate::config::MAX_THREADS;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Records every assignment it sees
    #[derive(Default)]
    struct RecordingTask {
        seen: Mutex<Vec<WorkerAssignment>>,
    }

    impl WorkerTask for RecordingTask {
        fn perform(&self, assignment: &WorkerAssignment) -> Result<()> {
            self.seen.lock().unwrap().push(*assignment);
            Ok(())
        }
    }

    /// Counts invocations
    #[derive(Default)]
    struct CountingTask {
        calls: AtomicUsize,
    }

    impl WorkerTask for CountingTask {
        fn perform(&self, _assignment: &WorkerAssignment) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Sleeps for a fixed time, longer for one rank
    struct SlowTask {
        slow_rank: usize,
        slow: Duration,
    }

    impl WorkerTask for SlowTask {
        fn perform(&self, assignment: &WorkerAssignment) -> Result<()> {
            if assignment.rank == self.slow_rank {
                thread::sleep(self.slow);
            }
            Ok(())
        }
    }

    fn count(n: i64) -> ValidCount {
        validator::validate_count(n).unwrap()
    }

    #[test]
    fn test_every_rank_reports_exactly_once() {
        for n in [1, 2, 7, 16] {
            let task = Arc::new(RecordingTask::default());
            let coordinator = Coordinator::new(task.clone());
            let summary = coordinator.run_detailed(count(n));

            assert_eq!(summary.outcome, AggregateOutcome::AllSucceeded);
            assert_eq!(summary.requested, n as usize);
            assert_eq!(summary.launched, n as usize);
            assert_eq!(summary.completed, n as usize);
            assert_eq!(summary.stats.reported(), n as u64);

            let seen = task.seen.lock().unwrap();
            assert_eq!(seen.len(), n as usize);
            let ranks: HashSet<usize> = seen.iter().map(|a| a.rank).collect();
            assert_eq!(ranks, (0..n as usize).collect::<HashSet<_>>());
            assert!(seen.iter().all(|a| a.total_count == n as usize));
        }
    }

    #[test]
    fn test_invalid_input_spawns_nothing() {
        let task = Arc::new(CountingTask::default());
        let coordinator = Coordinator::new(task.clone());

        for input in ["0", "-4", "65", "abc", "", "2.5"] {
            assert!(coordinator.launch(input).is_err(), "input {:?} accepted", input);
        }

        assert_eq!(coordinator.workers_spawned(), 0);
        assert_eq!(task.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_launch_reports_config_error_kind() {
        let coordinator = Coordinator::new(Arc::new(CountingTask::default()));
        assert!(matches!(
            coordinator.launch("many"),
            Err(ConfigError::NotANumber { .. })
        ));
        assert!(matches!(
            coordinator.launch("65"),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_repeated_runs_are_independent() {
        let task = Arc::new(CountingTask::default());
        let coordinator = Coordinator::new(task.clone());

        let first = coordinator.run_detailed(count(5));
        let second = coordinator.run_detailed(count(5));

        assert_eq!(first.completed, 5);
        assert_eq!(second.completed, 5);
        assert_eq!(first.stats.reported(), 5);
        assert_eq!(second.stats.reported(), 5);
        assert_eq!(coordinator.workers_spawned(), 10);
        assert_eq!(task.calls.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_fault_isolated_to_one_rank() {
        for mode in [FaultMode::Error, FaultMode::Panic] {
            let recorder = Arc::new(RecordingTask::default());
            let task = Arc::new(FaultInjector::new(recorder.clone(), 2, mode));
            let coordinator = Coordinator::new(task);

            let summary = coordinator.run_detailed(count(5));
            let failures = summary.outcome.failures();
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].rank, 2);
            assert_eq!(summary.succeeded(), 4);
            assert_eq!(summary.stats.failed(), 1);

            let mut ranks: Vec<usize> = recorder.seen.lock().unwrap().iter().map(|a| a.rank).collect();
            ranks.sort_unstable();
            assert_eq!(ranks, vec![0, 1, 3, 4]);
        }
    }

    #[test]
    fn test_boundary_counts() {
        let coordinator = Coordinator::new(Arc::new(CountingTask::default()));
        assert!(coordinator.launch("1").unwrap().outcome.is_success());

        let summary = coordinator.launch(&MAX_THREADS.to_string()).unwrap();
        assert!(summary.outcome.is_success());
        assert_eq!(summary.completed, MAX_THREADS);

        assert!(coordinator.launch(&(MAX_THREADS + 1).to_string()).is_err());
    }

    #[test]
    fn test_four_greetings_succeed() {
        let coordinator = Coordinator::new(Arc::new(
            GreetingTask::new().with_jitter(Jitter::new(5, 1)),
        ));
        let summary = coordinator.launch("4").unwrap();
        assert_eq!(summary.outcome, AggregateOutcome::AllSucceeded);
        assert_eq!(summary.completed, 4);
    }

    #[test]
    fn test_out_of_order_arrival_is_handled() {
        // Rank 0 finishes last
        let coordinator = Coordinator::new(Arc::new(SlowTask {
            slow_rank: 0,
            slow: Duration::from_millis(50),
        }));
        let summary = coordinator.run_detailed(count(4));
        assert!(summary.outcome.is_success());
        assert_eq!(summary.completed, 4);
    }

    #[test]
    fn test_timeout_marks_unreported_workers() {
        let coordinator = Coordinator::new(Arc::new(SlowTask {
            slow_rank: 1,
            slow: Duration::from_secs(3),
        }))
        .with_timeout(Some(Duration::from_millis(500)));

        let summary = coordinator.run_detailed(count(3));
        assert_eq!(summary.completed, 3);
        assert_eq!(
            summary.outcome,
            AggregateOutcome::PartialFailure(vec![Failure {
                rank: 1,
                cause: WorkerFault::TimedOut,
            }])
        );
        assert_eq!(summary.stats.reported(), 2);
    }

    #[test]
    fn test_no_timeout_waits_for_slow_worker() {
        let coordinator = Coordinator::new(Arc::new(SlowTask {
            slow_rank: 2,
            slow: Duration::from_millis(100),
        }))
        .with_timeout(Some(Duration::from_secs(30)));

        assert!(coordinator.run(count(3)).is_success());
    }

    #[test]
    fn test_channel_closed_without_outcomes() {
        let (tx, rx) = channel::bounded::<Completion>(3);
        drop(tx);

        let mut state = CoordinatorState::new(3);
        for _ in 0..3 {
            state.record_launch();
        }
        state.record(WorkerOutcome::Success { rank: 1 });

        let coordinator = Coordinator::new(Arc::new(CountingTask::default()));
        let mut stats = RunStats::new();
        let abandoned = coordinator.aggregate(&rx, &mut state, &mut stats);

        assert!(abandoned.is_empty());
        assert!(state.is_terminal());
        let failures = state.into_outcome();
        let ranks: Vec<(usize, WorkerFault)> = failures
            .failures()
            .iter()
            .map(|f| (f.rank, f.cause.clone()))
            .collect();
        assert_eq!(
            ranks,
            vec![(0, WorkerFault::ChannelClosed), (2, WorkerFault::ChannelClosed)]
        );
    }

    #[test]
    fn test_from_config_applies_fault_injection() {
        let mut config = Config::default();
        config.workers.fail_rank = Some(0);
        config.workers.fail_mode = FaultMode::Error;

        let coordinator = Coordinator::from_config(&config).unwrap();
        let outcome = coordinator.run(count(2));
        assert_eq!(outcome.failures().len(), 1);
        assert_eq!(outcome.failures()[0].rank, 0);
    }

    #[test]
    fn test_exit_code_follows_outcome() {
        let coordinator = Coordinator::new(Arc::new(CountingTask::default()));
        assert_eq!(coordinator.run(count(3)).exit_code(), 0);

        let task = Arc::new(FaultInjector::new(
            Arc::new(CountingTask::default()),
            1,
            FaultMode::Error,
        ));
        let outcome = Coordinator::new(task).with_debug(true).run(count(3));
        assert!(!outcome.is_success());
        assert_eq!(outcome.exit_code(), 1);
    }

    #[test]
    fn test_from_config_rejects_bad_cores() {
        let mut config = Config::default();
        config.workers.cpu_cores = Some("x-y".to_string());
        assert!(Coordinator::from_config(&config).is_err());
    }
}
