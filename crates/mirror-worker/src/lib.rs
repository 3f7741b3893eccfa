//! # mirror-worker: Cache Population
//!
//! Converges the cache on what clients have asked for. Each queued
//! [`AssetDescriptor`](mirror_core::AssetDescriptor) is processed by
//! [`PopulationWorker::populate`]:
//!
//! 1. If the object already exists in storage (another worker won the race),
//!    only refresh the registry row.
//! 2. Otherwise fetch from the origin, resolve the version, write the bytes
//!    atomically, and upsert the registry row.
//!
//! Delivery is at-least-once, so populate is idempotent: re-running it for
//! the same descriptor converges on the same object and the same row.
//!
//! [`TaskRunner`] wraps one claim/populate/acknowledge cycle with the
//! [`RetryPolicy`]; [`WorkerPool`] runs N of those loops until cancelled.

pub mod config;
pub mod error;
pub mod pool;
pub mod populate;
pub mod retry;
pub mod runner;

pub use config::WorkerConfig;
pub use error::PopulateError;
pub use pool::WorkerPool;
pub use populate::{PopulateOutcome, PopulationWorker};
pub use retry::RetryPolicy;
pub use runner::{TaskOutcome, TaskRunner};
