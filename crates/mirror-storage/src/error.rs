//! Storage error type.

use thiserror::Error;

/// Errors raised by storage backends.
///
/// Backends report failures and never retry on their own; callers consult
/// [`StorageError::is_retryable`] to decide.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The path is absolute, empty, or escapes the storage root.
    #[error("invalid storage path: {0:?}")]
    InvalidPath(String),

    /// No object exists at the path.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Local filesystem failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The body did not match the declared content length.
    #[error("length mismatch writing {path}: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    /// The object store could not be reached or the transfer broke off.
    #[error("object store request for {path} failed: {message}")]
    Transport { path: String, message: String },

    /// The object store answered with an unexpected status.
    #[error("object store returned {status} for {path}")]
    Status { path: String, status: u16 },
}

impl StorageError {
    pub fn io(path: &str, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::InvalidPath(_) | Self::NotFound(_) => false,
            Self::Io { .. } | Self::LengthMismatch { .. } | Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }
}
