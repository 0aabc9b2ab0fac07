//! Aggregate statistics over an execution run.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Counts and durations over the full task set of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStats {
    /// Tasks submitted
    pub total: usize,
    /// Tasks that succeeded
    pub succeeded: usize,
    /// Tasks that failed
    pub failed: usize,
    /// Tasks never started
    pub skipped: usize,
    /// Sum of task durations
    pub total_duration: Duration,
    /// Mean duration of tasks that ran
    pub average_duration: Duration,
    /// Shortest task that ran
    pub min_duration: Option<Duration>,
    /// Longest task that ran
    pub max_duration: Option<Duration>,
    /// Wall-clock time of the whole run
    pub wall_time: Duration,
    /// Highest number of tasks running at once
    pub peak_concurrency: usize,
}

impl ExecutionStats {
    /// Build statistics from the durations of tasks that ran.
    pub(crate) fn from_durations(
        durations: &[Duration],
        succeeded: usize,
        failed: usize,
        skipped: usize,
        wall_time: Duration,
        peak_concurrency: usize,
    ) -> Self {
        let total_duration: Duration = durations.iter().sum();
        let average_duration = if durations.is_empty() {
            Duration::ZERO
        } else {
            total_duration / durations.len() as u32
        };

        Self {
            total: succeeded + failed + skipped,
            succeeded,
            failed,
            skipped,
            total_duration,
            average_duration,
            min_duration: durations.iter().min().copied(),
            max_duration: durations.iter().max().copied(),
            wall_time,
            peak_concurrency,
        }
    }

    /// Fraction of tasks that succeeded.
    pub fn success_rate(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.succeeded as f32 / self.total as f32
        }
    }
}
