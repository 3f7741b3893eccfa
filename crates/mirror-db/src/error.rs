//! Persistence error types.

use thiserror::Error;
use uuid::Uuid;

/// Asset registry failures.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("registry database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be mapped back to an `AssetRecord`.
    #[error("corrupt registry row {id}: {reason}")]
    Corrupt { id: Uuid, reason: String },
}

/// Task queue failures.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("queue database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cannot serialize task payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("task {0} not found")]
    NotFound(Uuid),

    #[error("corrupt task row {id}: {reason}")]
    Corrupt { id: Uuid, reason: String },
}
