//! threadfan - bounded fan-out/fan-in thread coordinator
//!
//! threadfan launches a bounded number of isolated worker threads, lets each one
//! perform its unit of work, and collects exactly one terminal outcome per worker
//! into a single aggregate result.
//!
//! # Architecture
//!
//! - **Coordinator**: validates the worker count, spawns workers, aggregates outcomes
//! - **Worker units**: isolated threads that report one `WorkerOutcome` each
//! - **Completion channel**: a single multiplexed crossbeam channel (workers → coordinator)
//! - **Reports**: human-readable summary plus optional JSON export

pub mod config;
pub mod coordinator;
pub mod output;
pub mod stats;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use config::{Config, MAX_THREADS};
pub use coordinator::{AggregateOutcome, Coordinator};
pub use worker::{WorkerAssignment, WorkerOutcome};

/// Result type used throughout threadfan
pub type Result<T> = anyhow::Result<T>;
