//! Task waiter.
//!
//! Polls submitted index tasks until each one is terminal. Every task moves
//! through an explicit state machine:
//!
//! ```text
//! Pending ──succeeded──▶ Succeeded
//!    │
//!    └──failed/canceled──▶ Failed
//! ```
//!
//! All tasks of one wait share a single retry budget. Between polling rounds
//! the waiter sleeps for the next delay of its [`BackoffPolicy`]; once the
//! budget is spent with tasks still pending, the wait ends in
//! [`WaitError::Timeout`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_retry::strategy::{ExponentialBackoff, FixedInterval};
use tracing::{debug, instrument, warn};

use crate::errors::WaitError;
use search_sync_repository::SearchIndexProvider;
use search_sync_shared::{AsyncIndexTask, TaskStatus, TaskUid};

/// Default number of backoff rounds before giving up.
pub const DEFAULT_TASK_MAX_RETRIES: usize = 30;

/// Default delay between polling rounds.
pub const DEFAULT_TASK_BACKOFF: Duration = Duration::from_millis(500);

/// Delay schedule between polling rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// The same delay every round.
    Fixed(Duration),
    /// Starts at `initial`, doubles every round, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Fixed(DEFAULT_TASK_BACKOFF)
    }
}

impl BackoffPolicy {
    /// The (unbounded) sequence of delays.
    pub fn delays(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        match *self {
            BackoffPolicy::Fixed(interval) => Box::new(FixedInterval::new(interval)),
            BackoffPolicy::Exponential { initial, max } => {
                // 2^n * factor, so the first delay is 2 * factor.
                let factor = (initial.as_millis() as u64 / 2).max(1);
                Box::new(
                    ExponentialBackoff::from_millis(2)
                        .factor(factor)
                        .max_delay(max),
                )
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TaskState {
    Pending,
    Succeeded,
    Failed { message: String },
}

impl TaskState {
    fn from_task(task: &AsyncIndexTask) -> Self {
        match task.status {
            TaskStatus::Succeeded => TaskState::Succeeded,
            status if status.is_failure() => TaskState::Failed {
                message: task
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("task {}", status_name(status))),
            },
            _ => TaskState::Pending,
        }
    }
}

fn status_name(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Enqueued => "enqueued",
        TaskStatus::Processing => "processing",
        TaskStatus::Succeeded => "succeeded",
        TaskStatus::Failed => "failed",
        TaskStatus::Canceled => "canceled",
    }
}

struct Tracked {
    index_uid: Option<String>,
    state: TaskState,
}

/// Waits for index tasks with a bounded retry budget.
#[derive(Clone)]
pub struct TaskWaiter {
    provider: Arc<dyn SearchIndexProvider>,
    max_retries: usize,
    backoff: BackoffPolicy,
}

impl TaskWaiter {
    pub fn new(provider: Arc<dyn SearchIndexProvider>, max_retries: usize, backoff: BackoffPolicy) -> Self {
        Self {
            provider,
            max_retries,
            backoff,
        }
    }

    /// Wait until every task has succeeded.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - All tasks succeeded (immediately, for an empty list)
    /// * `Err(WaitError::Failed)` - A task failed or was canceled
    /// * `Err(WaitError::Timeout)` - Tasks were still pending after `max_retries` backoffs
    /// * `Err(WaitError::Provider)` - The service rejected a status request
    #[instrument(skip(self, tasks), fields(task_count = tasks.len()))]
    pub async fn wait(&self, tasks: &[AsyncIndexTask]) -> Result<(), WaitError> {
        if tasks.is_empty() {
            return Ok(());
        }

        let mut tracked: BTreeMap<TaskUid, Tracked> = tasks
            .iter()
            .map(|task| {
                (
                    task.task_uid,
                    Tracked {
                        index_uid: task.index_uid.clone(),
                        state: TaskState::from_task(task),
                    },
                )
            })
            .collect();
        let mut delays = self.backoff.delays().take(self.max_retries);

        loop {
            self.poll_pending(&mut tracked).await?;

            let failure = tracked.iter().find_map(|(task_uid, task)| match &task.state {
                TaskState::Failed { message } => Some(WaitError::Failed {
                    task_uid: *task_uid,
                    index_uid: task.index_uid.clone(),
                    message: message.clone(),
                }),
                _ => None,
            });
            if let Some(failure) = failure {
                return Err(failure);
            }

            let pending: Vec<TaskUid> = tracked
                .iter()
                .filter(|(_, task)| task.state == TaskState::Pending)
                .map(|(task_uid, _)| *task_uid)
                .collect();
            if pending.is_empty() {
                debug!("All tasks succeeded");
                return Ok(());
            }

            match delays.next() {
                Some(delay) => {
                    debug!(
                        pending = pending.len(),
                        delay_ms = delay.as_millis() as u64,
                        "Tasks pending, backing off"
                    );
                    sleep(delay).await;
                }
                None => {
                    warn!(pending = ?pending, retries = self.max_retries, "Gave up waiting for tasks");
                    return Err(WaitError::Timeout {
                        pending,
                        retries: self.max_retries,
                    });
                }
            }
        }
    }

    /// Poll every pending task once and record its new state.
    ///
    /// Transient polling failures leave the task pending; any other polling
    /// failure ends the wait.
    async fn poll_pending(&self, tracked: &mut BTreeMap<TaskUid, Tracked>) -> Result<(), WaitError> {
        for (task_uid, task) in tracked.iter_mut() {
            if task.state != TaskState::Pending {
                continue;
            }
            match self.provider.get_task(*task_uid).await {
                Ok(polled) => {
                    task.state = TaskState::from_task(&polled);
                    if let TaskState::Failed { message } = &task.state {
                        warn!(task_uid, error = %message, "Task failed");
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!(task_uid, error = %e, "Task poll failed, will retry");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
