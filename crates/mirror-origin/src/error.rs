//! Origin error types.

use thiserror::Error;

/// Errors from origin requests.
#[derive(Error, Debug)]
pub enum OriginError {
    /// No response head within the configured timeout.
    #[error("origin request to {url} timed out")]
    Timeout { url: String },

    /// Connection failure or broken transfer.
    #[error("origin request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The origin answered with a non-2xx status.
    #[error("origin returned {status} for {url}")]
    Status { url: String, status: u16 },

    /// The descriptor does not produce a valid URL against the configured base.
    #[error("cannot build origin URL: {0}")]
    InvalidUrl(String),

    /// The HTTP client could not be constructed.
    #[error("origin client configuration error: {0}")]
    Config(String),
}

impl OriginError {
    /// Whether retrying the same request may succeed.
    ///
    /// Timeouts, transport failures, 429 and 5xx are transient; other 4xx
    /// statuses and configuration errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidUrl(_) | Self::Config(_) => false,
        }
    }

    /// Whether the origin reported the file absent (404 or 410).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404 | 410, .. })
    }
}
