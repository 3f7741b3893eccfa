//! # Error Types
//!
//! Parse failures are always the client's fault: the API maps every
//! [`ParseError`] to 400 Bad Request.

use thiserror::Error;

/// Failure to turn a request path into an [`AssetDescriptor`](crate::AssetDescriptor).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The path matches none of the known asset patterns.
    #[error("path does not match any asset pattern: {path}")]
    InvalidPattern { path: String },

    /// The `rev` query parameter is present but malformed.
    #[error("invalid revision parameter: {value}")]
    InvalidRevision { value: String },

    /// A stored or serialized kind name is not recognized.
    #[error("unknown asset kind: {0}")]
    UnknownKind(String),

    /// A descriptor was constructed with fields that violate its invariants.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
}

impl ParseError {
    pub(crate) fn pattern(path: &str) -> Self {
        Self::InvalidPattern {
            path: path.to_string(),
        }
    }
}
