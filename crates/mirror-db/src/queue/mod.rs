//! # Population Task Queue
//!
//! At-least-once delivery of [`AssetDescriptor`] payloads to population
//! workers. A claimed task is leased; if the worker neither completes nor
//! fails it before the lease runs out, the task is handed out again.
//!
//! Task lifecycle:
//!
//! ```text
//! queued ──claim──▶ running ──complete──▶ done
//!   ▲                  │
//!   └─record_failure───┤
//!                      └──dead_letter──▶ failed
//! ```

pub mod memory;
pub mod postgres;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mirror_core::AssetDescriptor;
use serde::Serialize;
use uuid::Uuid;

use crate::error::QueueError;

/// How long a claimed task stays invisible to other workers.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(300);

/// Queue status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Done,
    /// Dead-lettered: retries exhausted or a fatal error.
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// A stored population task.
#[derive(Debug, Clone, Serialize)]
pub struct PopulationTask {
    pub id: Uuid,
    /// Serialized [`AssetDescriptor`].
    pub payload: serde_json::Value,
    pub status: TaskStatus,
    /// Failed attempts so far.
    pub attempts: u32,
    pub last_error: Option<String>,
    pub available_at: DateTime<Utc>,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A task handed to a worker.
#[derive(Debug, Clone)]
pub struct ClaimedTask {
    pub id: Uuid,
    pub payload: serde_json::Value,
    /// Failed attempts before this claim.
    pub attempts: u32,
}

impl ClaimedTask {
    /// Decode and validate the payload.
    ///
    /// A payload that fails here can never succeed, so callers treat the
    /// error as fatal.
    pub fn descriptor(&self) -> Result<AssetDescriptor, String> {
        let descriptor: AssetDescriptor =
            serde_json::from_value(self.payload.clone()).map_err(|e| e.to_string())?;
        descriptor.validate().map_err(|e| e.to_string())?;
        Ok(descriptor)
    }
}

/// Durable queue of population tasks.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Queue a task for `descriptor`, available immediately.
    async fn enqueue(&self, descriptor: &AssetDescriptor) -> Result<Uuid, QueueError>;

    /// Take the next available task, if any, and lease it.
    async fn claim(&self) -> Result<Option<ClaimedTask>, QueueError>;

    /// Record a failed attempt and make the task available again at `retry_at`.
    async fn record_failure(
        &self,
        id: Uuid,
        attempts: u32,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> Result<(), QueueError>;

    /// Mark the task done.
    async fn complete(&self, id: Uuid) -> Result<(), QueueError>;

    /// Move the task to the dead-letter state.
    async fn dead_letter(&self, id: Uuid, attempts: u32, error: &str) -> Result<(), QueueError>;

    /// Most recently dead-lettered tasks first.
    async fn list_failed(&self, limit: u32) -> Result<Vec<PopulationTask>, QueueError>;

    /// Fetch one task by id.
    async fn get(&self, id: Uuid) -> Result<Option<PopulationTask>, QueueError>;
}

fn attempts_to_db(attempts: u32) -> i32 {
    i32::try_from(attempts).unwrap_or(i32::MAX)
}

fn attempts_from_db(attempts: i32) -> u32 {
    u32::try_from(attempts).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_core::AssetKind;

    #[test]
    fn status_strings_round_trip() {
        for status in [
            TaskStatus::Queued,
            TaskStatus::Running,
            TaskStatus::Done,
            TaskStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("paused".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn claimed_payload_decodes_and_validates() {
        let d = AssetDescriptor::new(
            AssetKind::PluginZip,
            Some("akismet".into()),
            "akismet.zip",
            None,
            None,
        )
        .unwrap();
        let task = ClaimedTask {
            id: Uuid::new_v4(),
            payload: serde_json::to_value(&d).unwrap(),
            attempts: 0,
        };
        assert_eq!(task.descriptor().unwrap(), d);

        let bad = ClaimedTask {
            id: Uuid::new_v4(),
            payload: serde_json::json!({"kind": "plugin_zip", "file_name": "../x.zip"}),
            attempts: 0,
        };
        assert!(bad.descriptor().is_err());

        let garbage = ClaimedTask {
            id: Uuid::new_v4(),
            payload: serde_json::json!("nope"),
            attempts: 0,
        };
        assert!(garbage.descriptor().is_err());
    }
}
