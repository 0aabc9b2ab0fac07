//! Parallel task executor.
//!
//! Runs independent async tasks on the caller's task with a concurrency cap.
//! Every task is awaited to settlement before the report is built, so a
//! failing task never cancels its siblings.

use futures::future::{join_all, BoxFuture};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::{ExecutionStats, ExecutorConfig};

/// A named unit of work.
pub struct ExecutorTask<'a, T, E> {
    /// Task id; results are keyed by it
    pub id: String,
    future: BoxFuture<'a, Result<T, E>>,
}

impl<'a, T, E> ExecutorTask<'a, T, E> {
    /// Wrap a future as a task.
    pub fn new<F>(id: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'a,
    {
        Self {
            id: id.into(),
            future: Box::pin(future),
        }
    }
}

impl<T, E> fmt::Debug for ExecutorTask<'_, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorTask").field("id", &self.id).finish()
    }
}

/// How a task settled.
#[derive(Debug)]
pub enum TaskOutcome<T, E> {
    /// Completed with a value
    Succeeded {
        /// Task output
        value: T,
        /// Time spent running
        duration: Duration,
    },
    /// Completed with an error
    Failed {
        /// Task error
        error: E,
        /// Time spent running
        duration: Duration,
    },
    /// Never started
    Skipped,
}

impl<T, E> TaskOutcome<T, E> {
    /// Whether the task succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded { .. })
    }

    fn duration(&self) -> Option<Duration> {
        match self {
            TaskOutcome::Succeeded { duration, .. } | TaskOutcome::Failed { duration, .. } => {
                Some(*duration)
            }
            TaskOutcome::Skipped => None,
        }
    }
}

/// Per-task outcomes plus aggregate statistics.
#[derive(Debug)]
pub struct ExecutionReport<T, E> {
    /// Outcomes keyed by task id
    pub outcomes: BTreeMap<String, TaskOutcome<T, E>>,
    /// Statistics over the full task set
    pub stats: ExecutionStats,
}

impl<T, E> ExecutionReport<T, E> {
    /// Successful tasks.
    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &T)> {
        self.outcomes.iter().filter_map(|(id, o)| match o {
            TaskOutcome::Succeeded { value, .. } => Some((id.as_str(), value)),
            _ => None,
        })
    }

    /// Failed tasks.
    pub fn failed(&self) -> impl Iterator<Item = (&str, &E)> {
        self.outcomes.iter().filter_map(|(id, o)| match o {
            TaskOutcome::Failed { error, .. } => Some((id.as_str(), error)),
            _ => None,
        })
    }

    /// Ids of tasks that never started.
    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, TaskOutcome::Skipped))
            .map(|(id, _)| id.as_str())
    }

    /// True when no task failed or was skipped.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.values().all(TaskOutcome::is_success)
    }
}

/// A task set rejected before anything ran.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// Two tasks share an id
    #[error("Duplicate task id: {0}")]
    DuplicateTaskId(String),
}

/// Runs tasks with a concurrency cap, isolating per-task failure.
#[derive(Debug, Clone, Default)]
pub struct ParallelExecutor {
    config: ExecutorConfig,
}

impl ParallelExecutor {
    /// Create an executor.
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Executor configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run every task and wait for all of them to settle.
    ///
    /// Task ids must be unique; a duplicate rejects the whole set before
    /// any task starts.
    pub async fn execute<'a, T, E>(
        &self,
        tasks: Vec<ExecutorTask<'a, T, E>>,
    ) -> Result<ExecutionReport<T, E>, ExecutorError>
    where
        E: fmt::Display,
    {
        let mut ids = HashSet::with_capacity(tasks.len());
        if let Some(dup) = tasks.iter().find(|t| !ids.insert(t.id.as_str())) {
            return Err(ExecutorError::DuplicateTaskId(dup.id.clone()));
        }

        let semaphore = Semaphore::new(self.config.max_concurrency.get());
        let halted = AtomicBool::new(false);
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let stop_on_first_error = self.config.stop_on_first_error;
        let run_started = Instant::now();

        debug!(
            "Executing {} tasks (max concurrency {})",
            tasks.len(),
            self.config.max_concurrency
        );

        let runs = tasks.into_iter().map(|task| {
            let semaphore = &semaphore;
            let halted = &halted;
            let in_flight = &in_flight;
            let peak = &peak;
            async move {
                let ExecutorTask { id, future } = task;

                let Ok(_permit) = semaphore.acquire().await else {
                    return (id, TaskOutcome::Skipped);
                };
                if halted.load(Ordering::SeqCst) {
                    debug!("Skipping task {} after earlier failure", id);
                    return (id, TaskOutcome::Skipped);
                }

                let running = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(running, Ordering::SeqCst);

                let started = Instant::now();
                let result = future.await;
                let duration = started.elapsed();
                in_flight.fetch_sub(1, Ordering::SeqCst);

                let outcome = match result {
                    Ok(value) => TaskOutcome::Succeeded { value, duration },
                    Err(error) => {
                        warn!("Task {} failed: {}", id, error);
                        if stop_on_first_error {
                            halted.store(true, Ordering::SeqCst);
                        }
                        TaskOutcome::Failed { error, duration }
                    }
                };
                (id, outcome)
            }
        });

        let settled = join_all(runs).await;

        let mut durations = Vec::with_capacity(settled.len());
        let (mut succeeded, mut failed, mut skipped) = (0, 0, 0);
        let mut outcomes = BTreeMap::new();

        for (id, outcome) in settled {
            match &outcome {
                TaskOutcome::Succeeded { .. } => succeeded += 1,
                TaskOutcome::Failed { .. } => failed += 1,
                TaskOutcome::Skipped => skipped += 1,
            }
            if let Some(d) = outcome.duration() {
                durations.push(d);
            }
            outcomes.insert(id, outcome);
        }

        let stats = ExecutionStats::from_durations(
            &durations,
            succeeded,
            failed,
            skipped,
            run_started.elapsed(),
            peak.load(Ordering::SeqCst),
        );

        debug!(
            "Execution finished: {} succeeded, {} failed, {} skipped",
            stats.succeeded, stats.failed, stats.skipped
        );

        Ok(ExecutionReport { outcomes, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;

    fn config(max: usize) -> ExecutorConfig {
        ExecutorConfig::default().with_max_concurrency(NonZeroUsize::new(max).unwrap())
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let executor = ParallelExecutor::new(config(4));
        let tasks = vec![
            ExecutorTask::new("a", async { Ok::<_, String>(1) }),
            ExecutorTask::new("b", async { Err::<i32, _>("boom".to_string()) }),
            ExecutorTask::new("c", async { Ok(3) }),
        ];

        let report = executor.execute(tasks).await.unwrap();

        assert_eq!(report.stats.total, 3);
        assert_eq!(report.stats.succeeded, 2);
        assert_eq!(report.stats.failed, 1);
        assert!(report.outcomes["a"].is_success());
        assert!(matches!(report.outcomes["b"], TaskOutcome::Failed { .. }));
        assert!(report.outcomes["c"].is_success());
        assert!(!report.all_succeeded());
    }

    #[tokio::test]
    async fn test_concurrency_cap_is_respected() {
        let executor = ParallelExecutor::new(config(2));
        let tasks = (0..6)
            .map(|i| {
                ExecutorTask::new(format!("t{i}"), async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, String>(i)
                })
            })
            .collect();

        let report = executor.execute(tasks).await.unwrap();

        assert_eq!(report.stats.succeeded, 6);
        assert!(report.stats.peak_concurrency <= 2);
        assert!(report.stats.peak_concurrency >= 1);
    }

    #[tokio::test]
    async fn test_stop_on_first_error_skips_pending_tasks() {
        let executor = ParallelExecutor::new(config(1).with_stop_on_first_error(true));
        let tasks = vec![
            ExecutorTask::new("1", async { Err::<(), _>("first".to_string()) }),
            ExecutorTask::new("2", async { Ok(()) }),
            ExecutorTask::new("3", async { Ok(()) }),
        ];

        let report = executor.execute(tasks).await.unwrap();

        assert_eq!(report.stats.failed, 1);
        assert_eq!(report.stats.skipped, 2);
        assert_eq!(report.skipped().collect::<Vec<_>>(), vec!["2", "3"]);
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_rejected_before_running() {
        let executor = ParallelExecutor::new(config(2));
        let ran = AtomicUsize::new(0);
        let tasks = vec![
            ExecutorTask::new("a", async {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(1)
            }),
            ExecutorTask::new("b", async {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(2)
            }),
            ExecutorTask::new("a", async {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(3)
            }),
        ];

        let err = executor.execute(tasks).await.unwrap_err();
        assert_eq!(err, ExecutorError::DuplicateTaskId("a".into()));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_results_keyed_by_id_regardless_of_completion_order() {
        let executor = ParallelExecutor::new(config(3));
        let tasks = vec![
            ExecutorTask::new("slow", async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok::<_, String>("slow")
            }),
            ExecutorTask::new("fast", async { Ok("fast") }),
        ];

        let report = executor.execute(tasks).await.unwrap();
        let values: Vec<_> = report.succeeded().collect();
        assert_eq!(values, vec![("fast", &"fast"), ("slow", &"slow")]);
    }
}
