//! Population error classification.

use mirror_db::RegistryError;
use mirror_origin::OriginError;
use mirror_storage::StorageError;
use thiserror::Error;

/// Why a population attempt failed, and whether to try again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PopulateError {
    /// Transient: origin timeouts, transport errors, 5xx/429, storage I/O,
    /// registry errors.
    #[error("retryable: {0}")]
    Retryable(String),

    /// Permanent: origin 4xx (other than 429), invalid descriptors.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl PopulateError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

impl From<OriginError> for PopulateError {
    fn from(e: OriginError) -> Self {
        if e.is_retryable() {
            Self::Retryable(e.to_string())
        } else {
            Self::Fatal(e.to_string())
        }
    }
}

impl From<StorageError> for PopulateError {
    fn from(e: StorageError) -> Self {
        if e.is_retryable() {
            Self::Retryable(e.to_string())
        } else {
            Self::Fatal(e.to_string())
        }
    }
}

impl From<RegistryError> for PopulateError {
    fn from(e: RegistryError) -> Self {
        Self::Retryable(e.to_string())
    }
}
