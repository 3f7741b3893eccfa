//! # mirror-storage: Durable Byte Storage
//!
//! A single [`StorageBackend`] trait with two implementations:
//!
//! - [`LocalStorage`]: a directory tree on local disk. Writes stream into a
//!   uniquely named staging file next to the destination, are fsynced, then
//!   renamed into place.
//! - [`ObjectStorage`]: an S3-compatible bucket addressed path-style over
//!   HTTP. An object becomes visible only once its single PUT completes.
//!
//! In both cases a reader never observes a partially written object: either
//! the previous bytes (or nothing) or the complete new bytes.
//!
//! Backends are shared as `Arc<dyn StorageBackend>`; select one at startup
//! with [`StorageConfig::from_env`] and [`StorageConfig::build`].

pub mod config;
pub mod error;
pub mod local;
pub mod object;
pub mod path;

use async_trait::async_trait;
use mirror_core::ByteStream;
use url::Url;

pub use config::{ConfigError, StorageConfig};
pub use error::StorageError;
pub use local::LocalStorage;
pub use object::ObjectStorage;
pub use path::validate_path;

/// An object opened for reading.
pub struct StoredObject {
    /// Size in bytes, when the backend knows it up front.
    pub size: Option<u64>,
    pub stream: ByteStream,
}

impl std::fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredObject")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Durable byte storage addressed by backend-relative paths.
///
/// Paths use `/` separators and are validated with [`validate_path`] before
/// any I/O.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend name for logs (`local`, `object`).
    fn name(&self) -> &'static str;

    /// Whether a complete object exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Open `path` for streaming. Returns [`StorageError::NotFound`] when absent.
    async fn open_read(&self, path: &str) -> Result<StoredObject, StorageError>;

    /// Write `body` to `path`, replacing any previous object atomically.
    ///
    /// When `content_length` is given, a body of any other length fails the
    /// write and leaves the previous state untouched. Returns the number of
    /// bytes written.
    async fn write_atomic(
        &self,
        path: &str,
        body: ByteStream,
        content_length: Option<u64>,
    ) -> Result<u64, StorageError>;

    /// Direct URL for backends that serve objects themselves.
    fn public_url(&self, path: &str) -> Option<Url>;
}
