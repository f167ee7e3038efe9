//! Coordinator run state
//!
//! Owned by the aggregation loop for the duration of one run and mutated only
//! there, so it needs no synchronization.

use super::AggregateOutcome;
use crate::worker::{Failure, WorkerFault, WorkerOutcome};

#[derive(Debug)]
pub struct CoordinatorState {
    requested: usize,
    launched: usize,
    completed: usize,
    failed: Vec<Failure>,
    reported: Vec<bool>,
}

impl CoordinatorState {
    pub fn new(requested: usize) -> Self {
        Self {
            requested,
            launched: 0,
            completed: 0,
            failed: Vec::new(),
            reported: vec![false; requested],
        }
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn launched(&self) -> usize {
        self.launched
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn failed(&self) -> &[Failure] {
        &self.failed
    }

    /// Count one launched worker (including one whose thread could not start)
    pub fn record_launch(&mut self) {
        debug_assert!(self.launched < self.requested);
        self.launched += 1;
    }

    /// The run is terminal once every launched worker has an outcome
    pub fn is_terminal(&self) -> bool {
        self.completed == self.launched
    }

    /// Record an outcome
    ///
    /// Returns false (and changes nothing) for a rank that already reported or
    /// is outside the run.
    pub fn record(&mut self, outcome: WorkerOutcome) -> bool {
        let rank = outcome.rank();
        match self.reported.get_mut(rank) {
            Some(seen) if !*seen => *seen = true,
            _ => return false,
        }

        self.completed += 1;
        if let WorkerOutcome::Failure(failure) = outcome {
            self.failed.push(failure);
        }
        true
    }

    /// Ranks that have not reported yet
    pub fn unreported(&self) -> Vec<usize> {
        self.reported
            .iter()
            .enumerate()
            .filter(|(_, seen)| !**seen)
            .map(|(rank, _)| rank)
            .collect()
    }

    /// Record a failure with `cause` for every launched rank that has not reported
    ///
    /// Returns the affected ranks.
    pub fn fail_unreported(&mut self, cause: WorkerFault) -> Vec<usize> {
        let ranks: Vec<usize> = self.unreported().into_iter().take(self.launched - self.completed).collect();
        for &rank in &ranks {
            self.record(WorkerOutcome::failure(rank, cause.clone()));
        }
        ranks
    }

    /// Consume the state into the aggregate outcome (failures ordered by rank)
    pub fn into_outcome(mut self) -> AggregateOutcome {
        if self.failed.is_empty() {
            AggregateOutcome::AllSucceeded
        } else {
            self.failed.sort_by_key(|f| f.rank);
            AggregateOutcome::PartialFailure(self.failed)
        }
    }
}
