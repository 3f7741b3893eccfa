//! In-memory task queue for single-process deployments and tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mirror_core::AssetDescriptor;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{ClaimedTask, PopulationTask, TaskQueue, TaskStatus, DEFAULT_LEASE};
use crate::error::QueueError;

/// Queue held in process memory. Leases behave as in Postgres.
#[derive(Debug)]
pub struct InMemoryTaskQueue {
    tasks: Mutex<HashMap<Uuid, PopulationTask>>,
    lease: Duration,
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::with_lease(DEFAULT_LEASE)
    }

    pub fn with_lease(lease: Duration) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            lease,
        }
    }

    /// Snapshot of every task, oldest first.
    pub fn snapshot(&self) -> Vec<PopulationTask> {
        let mut tasks: Vec<PopulationTask> = self.tasks.lock().values().cloned().collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }

    /// Tasks that are not yet done or failed.
    pub fn pending(&self) -> usize {
        self.tasks
            .lock()
            .values()
            .filter(|t| matches!(t.status, TaskStatus::Queued | TaskStatus::Running))
            .count()
    }

    fn update(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut PopulationTask),
    ) -> Result<(), QueueError> {
        let mut tasks = self.tasks.lock();
        let task = tasks.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        apply(task);
        task.updated_at = Utc::now();
        Ok(())
    }
}

fn claimable(task: &PopulationTask, now: DateTime<Utc>) -> bool {
    match task.status {
        TaskStatus::Queued => task.available_at <= now,
        TaskStatus::Running => task.locked_until.is_some_and(|until| until < now),
        TaskStatus::Done | TaskStatus::Failed => false,
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, descriptor: &AssetDescriptor) -> Result<Uuid, QueueError> {
        let payload = serde_json::to_value(descriptor)?;
        let now = Utc::now();
        let id = Uuid::new_v4();
        self.tasks.lock().insert(
            id,
            PopulationTask {
                id,
                payload,
                status: TaskStatus::Queued,
                attempts: 0,
                last_error: None,
                available_at: now,
                locked_until: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn claim(&self) -> Result<Option<ClaimedTask>, QueueError> {
        let now = Utc::now();
        let lease = chrono::Duration::from_std(self.lease).unwrap_or(chrono::Duration::MAX);
        let mut tasks = self.tasks.lock();
        let next = tasks
            .values_mut()
            .filter(|t| claimable(t, now))
            .min_by_key(|t| (t.available_at, t.created_at));
        Ok(next.map(|task| {
            task.status = TaskStatus::Running;
            task.locked_until = now.checked_add_signed(lease);
            task.updated_at = now;
            ClaimedTask {
                id: task.id,
                payload: task.payload.clone(),
                attempts: task.attempts,
            }
        }))
    }

    async fn record_failure(
        &self,
        id: Uuid,
        attempts: u32,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        self.update(id, |task| {
            task.status = TaskStatus::Queued;
            task.attempts = attempts;
            task.last_error = Some(error.to_string());
            task.available_at = retry_at;
            task.locked_until = None;
        })
    }

    async fn complete(&self, id: Uuid) -> Result<(), QueueError> {
        self.update(id, |task| {
            task.status = TaskStatus::Done;
            task.locked_until = None;
        })
    }

    async fn dead_letter(&self, id: Uuid, attempts: u32, error: &str) -> Result<(), QueueError> {
        self.update(id, |task| {
            task.status = TaskStatus::Failed;
            task.attempts = attempts;
            task.last_error = Some(error.to_string());
            task.locked_until = None;
        })
    }

    async fn list_failed(&self, limit: u32) -> Result<Vec<PopulationTask>, QueueError> {
        let mut failed: Vec<PopulationTask> = self
            .tasks
            .lock()
            .values()
            .filter(|t| t.status == TaskStatus::Failed)
            .cloned()
            .collect();
        failed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        failed.truncate(limit as usize);
        Ok(failed)
    }

    async fn get(&self, id: Uuid) -> Result<Option<PopulationTask>, QueueError> {
        Ok(self.tasks.lock().get(&id).cloned())
    }
}
