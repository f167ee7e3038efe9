//! Worker unit implementation
//!
//! A worker is the isolated execution unit launched by the coordinator. Each
//! worker receives an immutable [`WorkerAssignment`], performs its task on its
//! own thread, and reports exactly one [`WorkerOutcome`] back over the
//! completion channel.
//!
//! # Lifecycle
//!
//! 1. **Created**: `Worker::new()` takes ownership of the assignment
//! 2. **Running**: `run()` pins the thread (if requested) and performs the task
//! 3. **Terminated(outcome)**: the outcome is kept in the state and a single
//!    `Completion` carrying it is produced; running again returns the same outcome
//!
//! # Fault isolation
//!
//! Task errors and panics are caught inside the worker and turned into
//! `WorkerOutcome::Failure`. Nothing a task does can take down the coordinator
//! or a sibling worker.
//!
//! # Example
//!
//! ```
//! use threadfan::worker::{Worker, WorkerAssignment, WorkerOutcome, WorkerState};
//! use threadfan::worker::task::GreetingTask;
//! use std::sync::Arc;
//!
//! let mut worker = Worker::new(WorkerAssignment::new(0, 1), Arc::new(GreetingTask::new()));
//! let completion = worker.run();
//! assert_eq!(completion.outcome, WorkerOutcome::Success { rank: 0 });
//! assert_eq!(worker.state(), &WorkerState::Terminated(completion.outcome));
//! ```

pub mod affinity;
pub mod task;

use crossbeam::channel::Sender;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use task::WorkerTask;
use thiserror::Error;

/// Immutable per-worker assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerAssignment {
    /// Worker rank in `[0, total_count)`
    pub rank: usize,
    /// Number of workers in the run
    pub total_count: usize,
}

impl WorkerAssignment {
    pub fn new(rank: usize, total_count: usize) -> Self {
        debug_assert!(rank < total_count);
        Self { rank, total_count }
    }
}

/// Cause of a worker failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerFault {
    #[error("task error: {0}")]
    Task(String),

    #[error("task panicked: {0}")]
    Panic(String),

    #[error("cpu affinity: {0}")]
    Affinity(String),

    #[error("thread spawn failed: {0}")]
    Spawn(String),

    #[error("completion channel closed before the worker reported")]
    ChannelClosed,

    #[error("timed out before the worker reported")]
    TimedOut,
}

/// A failed worker and the reason it failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub rank: usize,
    pub cause: WorkerFault,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker {}: {}", self.rank, self.cause)
    }
}

/// Terminal outcome of a single worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    Success { rank: usize },
    Failure(Failure),
}

impl WorkerOutcome {
    pub fn rank(&self) -> usize {
        match self {
            WorkerOutcome::Success { rank } => *rank,
            WorkerOutcome::Failure(failure) => failure.rank,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WorkerOutcome::Success { .. })
    }

    pub fn failure(rank: usize, cause: WorkerFault) -> Self {
        WorkerOutcome::Failure(Failure { rank, cause })
    }
}

/// Message sent from a worker to the coordinator
#[derive(Debug, Clone)]
pub struct Completion {
    pub outcome: WorkerOutcome,
    /// Time the worker spent running (pinning plus task)
    pub elapsed: Duration,
}

/// Worker lifecycle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Running,
    Terminated(WorkerOutcome),
}

impl WorkerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Terminated(_))
    }
}

/// Isolated execution unit
pub struct Worker {
    assignment: WorkerAssignment,
    task: Arc<dyn WorkerTask>,
    core: Option<usize>,
    state: WorkerState,
    debug: bool,
}

impl Worker {
    /// Create a worker for the given assignment
    pub fn new(assignment: WorkerAssignment, task: Arc<dyn WorkerTask>) -> Self {
        Self {
            assignment,
            task,
            core: None,
            state: WorkerState::Created,
            debug: false,
        }
    }

    /// Pin the worker thread to a CPU core before running the task
    pub fn with_core(mut self, core: Option<usize>) -> Self {
        self.core = core;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn assignment(&self) -> WorkerAssignment {
        self.assignment
    }

    pub fn state(&self) -> &WorkerState {
        &self.state
    }

    fn transition(&mut self, next: WorkerState) {
        if self.debug {
            eprintln!(
                "DEBUG: worker {} {:?} -> {:?}",
                self.assignment.rank, self.state, next
            );
        }
        self.state = next;
    }

    /// Run the worker to termination on the current thread
    ///
    /// The task runs at most once; a terminated worker hands back its
    /// recorded outcome with zero elapsed time.
    pub fn run(&mut self) -> Completion {
        if let WorkerState::Terminated(ref outcome) = self.state {
            return Completion { outcome: outcome.clone(), elapsed: Duration::ZERO };
        }

        self.transition(WorkerState::Running);
        let start = Instant::now();

        let outcome = match self.pin() {
            Ok(()) => execute(&self.assignment, self.task.as_ref()),
            Err(cause) => WorkerOutcome::failure(self.assignment.rank, cause),
        };

        let elapsed = start.elapsed();
        self.transition(WorkerState::Terminated(outcome.clone()));
        Completion { outcome, elapsed }
    }

    /// Run the worker and deliver its completion to the coordinator
    ///
    /// This is the body of a worker thread. A failed send means the
    /// coordinator has stopped listening; the outcome is dropped with a warning.
    pub fn run_and_report(mut self, completions: &Sender<Completion>) {
        let rank = self.assignment.rank;
        let completion = self.run();
        if completions.send(completion).is_err() {
            eprintln!(
                "Warning: worker {} could not deliver its outcome (coordinator gone)",
                rank
            );
        }
    }

    fn pin(&self) -> Result<(), WorkerFault> {
        match self.core {
            Some(core) => affinity::pin_current_thread(core)
                .map_err(|e| WorkerFault::Affinity(format!("{:#}", e))),
            None => Ok(()),
        }
    }
}

/// Perform a task for one assignment and convert the result into an outcome
///
/// Errors returned by the task become `WorkerFault::Task`; panics are caught
/// and become `WorkerFault::Panic`. Always returns exactly one outcome.
pub fn execute(assignment: &WorkerAssignment, task: &dyn WorkerTask) -> WorkerOutcome {
    let rank = assignment.rank;
    match panic::catch_unwind(AssertUnwindSafe(|| task.perform(assignment))) {
        Ok(Ok(())) => WorkerOutcome::Success { rank },
        Ok(Err(e)) => WorkerOutcome::failure(rank, WorkerFault::Task(format!("{:#}", e))),
        Err(payload) => WorkerOutcome::failure(rank, WorkerFault::Panic(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::task::{FaultInjector, GreetingTask};
    use crate::config::FaultMode;

    struct FailingTask;

    impl WorkerTask for FailingTask {
        fn perform(&self, assignment: &WorkerAssignment) -> crate::Result<()> {
            anyhow::bail!("rank {} refused", assignment.rank)
        }
    }

    struct PanickingTask;

    impl WorkerTask for PanickingTask {
        fn perform(&self, assignment: &WorkerAssignment) -> crate::Result<()> {
            panic!("rank {} exploded", assignment.rank)
        }
    }

    #[test]
    fn test_execute_success() {
        let assignment = WorkerAssignment::new(1, 3);
        let outcome = execute(&assignment, &GreetingTask::new());
        assert_eq!(outcome, WorkerOutcome::Success { rank: 1 });
        assert!(outcome.is_success());
    }

    #[test]
    fn test_execute_error_becomes_failure() {
        let assignment = WorkerAssignment::new(2, 3);
        let outcome = execute(&assignment, &FailingTask);
        assert_eq!(
            outcome,
            WorkerOutcome::failure(2, WorkerFault::Task("rank 2 refused".to_string()))
        );
    }

    #[test]
    fn test_execute_panic_becomes_failure() {
        let assignment = WorkerAssignment::new(0, 1);
        let outcome = execute(&assignment, &PanickingTask);
        match outcome {
            WorkerOutcome::Failure(Failure { rank, cause: WorkerFault::Panic(msg) }) => {
                assert_eq!(rank, 0);
                assert_eq!(msg, "rank 0 exploded");
            }
            other => panic!("expected panic failure, got {:?}", other),
        }
    }

    /// Counts invocations
    #[derive(Default)]
    struct CountingTask {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl WorkerTask for CountingTask {
        fn perform(&self, _assignment: &WorkerAssignment) -> crate::Result<()> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_worker_lifecycle() {
        let task = Arc::new(CountingTask::default());
        let mut worker = Worker::new(WorkerAssignment::new(0, 2), task.clone()).with_debug(true);
        assert_eq!(worker.state(), &WorkerState::Created);
        assert!(!worker.state().is_terminal());
        assert_eq!(worker.assignment(), WorkerAssignment::new(0, 2));

        let completion = worker.run();
        assert_eq!(completion.outcome, WorkerOutcome::Success { rank: 0 });
        assert_eq!(worker.state(), &WorkerState::Terminated(WorkerOutcome::Success { rank: 0 }));

        // A terminated worker does not run its task again
        let again = worker.run();
        assert_eq!(again.outcome, completion.outcome);
        assert_eq!(again.elapsed, Duration::ZERO);
        assert_eq!(task.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_worker_terminates_with_failure() {
        let mut worker = Worker::new(WorkerAssignment::new(1, 2), Arc::new(FailingTask));
        let completion = worker.run();
        assert_eq!(
            worker.state(),
            &WorkerState::Terminated(WorkerOutcome::failure(
                1,
                WorkerFault::Task("rank 1 refused".to_string())
            ))
        );
        assert!(!completion.outcome.is_success());
    }

    #[test]
    fn test_run_and_report_sends_once() {
        let (tx, rx) = crossbeam::channel::unbounded();
        let task = Arc::new(FaultInjector::new(Arc::new(GreetingTask::new()), 1, FaultMode::Error));

        Worker::new(WorkerAssignment::new(1, 2), task).run_and_report(&tx);
        drop(tx);

        let received: Vec<Completion> = rx.iter().collect();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].outcome.rank(), 1);
        assert!(!received[0].outcome.is_success());
    }

    #[test]
    fn test_run_and_report_with_closed_channel() {
        let (tx, rx) = crossbeam::channel::unbounded();
        drop(rx);
        // Must not panic when the coordinator is gone
        Worker::new(WorkerAssignment::new(0, 1), Arc::new(GreetingTask::new())).run_and_report(&tx);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_affinity_failure_becomes_failure() {
        let mut worker = Worker::new(WorkerAssignment::new(0, 1), Arc::new(GreetingTask::new()))
            .with_core(Some(4096));
        let completion = worker.run();
        assert!(matches!(
            completion.outcome,
            WorkerOutcome::Failure(Failure { cause: WorkerFault::Affinity(_), .. })
        ));
    }

    #[test]
    fn test_failure_display() {
        let failure = Failure { rank: 3, cause: WorkerFault::ChannelClosed };
        assert_eq!(
            failure.to_string(),
            "worker 3: completion channel closed before the worker reported"
        );
    }
}
