//! One claim → populate → acknowledge cycle.

use std::sync::Arc;

use chrono::Utc;
use mirror_db::{ClaimedTask, QueueError, TaskQueue};
use tracing::{error, info, warn};

use crate::error::PopulateError;
use crate::populate::PopulationWorker;
use crate::retry::RetryPolicy;

/// What happened to a claimed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Populated (or found already cached) and marked done.
    Completed,
    /// Failed with a retryable error; requeued with backoff.
    Retrying { attempts: u32 },
    /// Fatal error or retries exhausted; moved to the dead-letter state.
    DeadLettered { attempts: u32 },
}

/// Pulls tasks from a queue and applies the retry policy.
#[derive(Clone)]
pub struct TaskRunner {
    worker: PopulationWorker,
    queue: Arc<dyn TaskQueue>,
    policy: RetryPolicy,
}

impl TaskRunner {
    pub fn new(worker: PopulationWorker, queue: Arc<dyn TaskQueue>, policy: RetryPolicy) -> Self {
        Self {
            worker,
            queue,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Claim and process one task. `Ok(None)` when nothing is available.
    pub async fn run_once(&self) -> Result<Option<TaskOutcome>, QueueError> {
        match self.queue.claim().await? {
            Some(task) => self.process(task).await.map(Some),
            None => Ok(None),
        }
    }

    /// Process tasks until none is available. Returns how many were handled.
    ///
    /// Terminates even when every task keeps failing: each task is attempted
    /// at most `max_attempts` times, and a requeued task whose retry time is
    /// still in the future is not claimable.
    pub async fn drain(&self) -> Result<usize, QueueError> {
        let mut handled = 0;
        while self.run_once().await?.is_some() {
            handled += 1;
        }
        Ok(handled)
    }

    async fn process(&self, task: ClaimedTask) -> Result<TaskOutcome, QueueError> {
        let attempt = task.attempts.saturating_add(1);

        let descriptor = match task.descriptor() {
            Ok(descriptor) => descriptor,
            Err(reason) => {
                let message = format!("undecodable payload: {reason}");
                error!(task_id = %task.id, error = %message, "dead-lettering population task");
                self.queue.dead_letter(task.id, attempt, &message).await?;
                return Ok(TaskOutcome::DeadLettered { attempts: attempt });
            }
        };

        match self.worker.populate(&descriptor).await {
            Ok(outcome) => {
                self.queue.complete(task.id).await?;
                info!(
                    task_id = %task.id,
                    path = %outcome.record().storage_path,
                    attempt,
                    "population task completed"
                );
                Ok(TaskOutcome::Completed)
            }
            Err(PopulateError::Retryable(message)) if self.policy.should_retry(attempt) => {
                let delay = self.policy.delay_for(attempt);
                let retry_at = Utc::now()
                    + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
                warn!(
                    task_id = %task.id,
                    attempt,
                    max_attempts = self.policy.max_attempts,
                    error = %message,
                    "population attempt failed, retrying in {delay:?}"
                );
                self.queue
                    .record_failure(task.id, attempt, &message, retry_at)
                    .await?;
                Ok(TaskOutcome::Retrying { attempts: attempt })
            }
            Err(e) => {
                error!(
                    task_id = %task.id,
                    attempt,
                    file = %descriptor.file_name,
                    error = %e,
                    "dead-lettering population task"
                );
                self.queue.dead_letter(task.id, attempt, &e.to_string()).await?;
                Ok(TaskOutcome::DeadLettered { attempts: attempt })
            }
        }
    }
}
