//! Concurrency budget for the parallel executor.

use std::num::NonZeroUsize;

/// Default concurrency cap.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Executor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Max tasks in the started state at once
    pub max_concurrency: NonZeroUsize,
    /// Skip not-yet-started tasks after the first failure
    pub stop_on_first_error: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: NonZeroUsize::new(DEFAULT_MAX_CONCURRENCY)
                .unwrap_or(NonZeroUsize::MIN),
            stop_on_first_error: false,
        }
    }
}

impl ExecutorConfig {
    /// Create a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// One task at a time.
    pub fn sequential() -> Self {
        Self::default().with_max_concurrency(NonZeroUsize::MIN)
    }

    /// Set the concurrency cap.
    pub fn with_max_concurrency(mut self, max: NonZeroUsize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Set whether the first failure stops remaining tasks from starting.
    pub fn with_stop_on_first_error(mut self, stop: bool) -> Self {
        self.stop_on_first_error = stop;
        self
    }
}
