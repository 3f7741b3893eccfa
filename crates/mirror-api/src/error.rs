//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Every error body has the shape `{"error":{"code","message"}}`. Internal
//! and upstream failure details are logged, never returned to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mirror_core::ParseError;
use mirror_db::RegistryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "BAD_GATEWAY").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// The request path or query does not name a mirrored file (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid bearer token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Resource absent, locally or at the origin (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),

    /// The origin failed or answered with an unexpected status (502).
    #[error("upstream error: {0}")]
    UpstreamError(String),

    /// A dependency (storage, database) is unavailable (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The origin did not answer in time (504).
    #[error("gateway timeout: {0}")]
    GatewayTimeout(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::UpstreamError(_) => (StatusCode::BAD_GATEWAY, "BAD_GATEWAY"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::GatewayTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "GATEWAY_TIMEOUT"),
        }
    }

    /// Client-facing message. Server-side failures get a fixed text.
    fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::UpstreamError(_) => "The upstream origin request failed".to_string(),
            Self::ServiceUnavailable(_) => "Service temporarily unavailable".to_string(),
            Self::GatewayTimeout(_) => "The upstream origin did not respond in time".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::UpstreamError(_) | Self::ServiceUnavailable(_) | Self::GatewayTimeout(_) => {
                tracing::warn!(error = %self, status = status.as_u16(), "request failed")
            }
            _ => {}
        }

        (status, Json(ErrorBody::new(code, self.public_message()))).into_response()
    }
}

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        Self::Internal(err.to_string())
    }
}
