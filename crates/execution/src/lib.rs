//! Execution layer - bounded parallel execution of independent tasks.

#![warn(missing_docs)]

pub mod scheduler;
pub mod stats;
pub mod executor;

pub use scheduler::{ExecutorConfig, DEFAULT_MAX_CONCURRENCY};
pub use stats::ExecutionStats;
pub use executor::{ExecutionReport, ExecutorError, ExecutorTask, ParallelExecutor, TaskOutcome};
