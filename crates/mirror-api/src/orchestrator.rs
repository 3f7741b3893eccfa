//! # Download Orchestrator
//!
//! Request-time decision engine. A stored object is a cache hit and is
//! streamed from the storage backend, or redirected to when the backend has a
//! public URL for it. Anything else is proxied live from the
//! origin while a population task is enqueued, so a later request for the
//! same file becomes a hit. A miss whose origin fetch fails transiently
//! (timeout, transport, 429, 5xx) still enqueues before the error is
//! returned; a 404/410 or other client error enqueues nothing.
//!
//! No state is kept between requests: each decision re-queries storage.
//! Concurrent first requests for one file each proxy and each enqueue; the
//! worker's idempotent upsert and atomic writes absorb the duplicates.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use mirror_core::{AssetDescriptor, DEFAULT_CONTENT_TYPE};
use mirror_db::TaskQueue;
use mirror_origin::{OriginClient, OriginError, OriginResponse};
use mirror_storage::{StorageBackend, StorageError, StoredObject};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::AppError;
use crate::middleware::metrics::ApiMetrics;

/// Response header reporting whether the body came from the cache.
pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-mirror-cache");

/// Result of a download decision.
pub enum Download {
    /// Served from the storage backend.
    Cached {
        descriptor: AssetDescriptor,
        object: StoredObject,
    },
    /// Stored on a backend that serves objects directly; the client is
    /// redirected there.
    Redirect {
        descriptor: AssetDescriptor,
        location: Url,
    },
    /// Proxied from the origin; a population task has been enqueued.
    Proxied {
        descriptor: AssetDescriptor,
        response: OriginResponse,
    },
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("cache", &self.cache_status())
            .field("file", &self.descriptor().file_name)
            .finish()
    }
}

impl Download {
    pub fn descriptor(&self) -> &AssetDescriptor {
        match self {
            Self::Cached { descriptor, .. }
            | Self::Redirect { descriptor, .. }
            | Self::Proxied { descriptor, .. } => descriptor,
        }
    }

    /// `HIT` or `MISS`.
    pub fn cache_status(&self) -> &'static str {
        match self {
            Self::Cached { .. } | Self::Redirect { .. } => "HIT",
            Self::Proxied { .. } => "MISS",
        }
    }
}

impl IntoResponse for Download {
    fn into_response(self) -> Response {
        let cache_status = self.cache_status();
        let (descriptor, content_type, length, stream) = match self {
            Self::Redirect { location, .. } => return redirect_response(&location),
            Self::Cached { descriptor, object } => {
                let content_type = descriptor.content_type_or(None).to_string();
                (descriptor, content_type, object.size, object.stream)
            }
            Self::Proxied {
                descriptor,
                response,
            } => {
                let content_type = descriptor
                    .content_type_or(response.content_type.as_deref())
                    .to_string();
                let length = response.content_length;
                (descriptor, content_type, length, response.into_stream())
            }
        };

        let mut response = Response::new(Body::from_stream(stream));
        *response.status_mut() = StatusCode::OK;
        let headers = response.headers_mut();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&content_type)
                .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
        );
        if let Some(length) = length {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
        }
        if let Some(disposition) = descriptor.content_disposition() {
            if let Ok(value) = HeaderValue::from_str(&disposition) {
                headers.insert(CONTENT_DISPOSITION, value);
            }
        }
        headers.insert(CACHE_STATUS_HEADER, HeaderValue::from_static(cache_status));
        response
    }
}

fn redirect_response(location: &Url) -> Response {
    let Ok(value) = HeaderValue::from_str(location.as_str()) else {
        error!(%location, "public object URL is not a valid header value");
        return AppError::Internal("invalid public object URL".to_string()).into_response();
    };
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::FOUND;
    response.headers_mut().insert(LOCATION, value);
    response
        .headers_mut()
        .insert(CACHE_STATUS_HEADER, HeaderValue::from_static("HIT"));
    response
}

/// Decides between cache hit and proxy-and-enqueue.
#[derive(Clone)]
pub struct DownloadOrchestrator {
    storage: Arc<dyn StorageBackend>,
    origin: OriginClient,
    queue: Arc<dyn TaskQueue>,
    metrics: ApiMetrics,
}

impl DownloadOrchestrator {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        origin: OriginClient,
        queue: Arc<dyn TaskQueue>,
        metrics: ApiMetrics,
    ) -> Self {
        Self {
            storage,
            origin,
            queue,
            metrics,
        }
    }

    /// Serve `descriptor` from the cache, or proxy it and enqueue population.
    pub async fn download(&self, descriptor: AssetDescriptor) -> Result<Download, AppError> {
        let path = descriptor.storage_path();

        if let Some(hit) = self.lookup(&path).await? {
            self.metrics.record_cache_lookup(descriptor.kind, true);
            debug!(%path, kind = %descriptor.kind, "cache hit");
            return Ok(match hit {
                Hit::Public(location) => Download::Redirect {
                    descriptor,
                    location,
                },
                Hit::Stored(object) => Download::Cached { descriptor, object },
            });
        }

        self.metrics.record_cache_lookup(descriptor.kind, false);
        let response = match self.origin.fetch(&descriptor).await {
            Ok(response) => response,
            Err(e) => {
                if e.is_retryable() {
                    warn!(%path, error = %e, "origin fetch failed on cache miss");
                    self.enqueue(&descriptor, &path).await;
                }
                return Err(origin_error(e));
            }
        };
        info!(
            %path,
            kind = %descriptor.kind,
            origin = %response.url,
            "cache miss, proxying from origin"
        );
        self.enqueue(&descriptor, &path).await;

        Ok(Download::Proxied {
            descriptor,
            response,
        })
    }

    /// Enqueue population. Failures are counted and logged, never returned.
    async fn enqueue(&self, descriptor: &AssetDescriptor, path: &str) {
        match self.queue.enqueue(descriptor).await {
            Ok(task_id) => info!(%task_id, %path, "enqueued population task"),
            Err(e) => {
                self.metrics.record_enqueue_failure();
                error!(%path, error = %e, "failed to enqueue population task");
            }
        }
    }

    /// Where a stored object at `path` can be served from, or `None` on a
    /// miss.
    ///
    /// An object removed between the existence check and the open counts as
    /// a miss.
    async fn lookup(&self, path: &str) -> Result<Option<Hit>, AppError> {
        if !self.storage.exists(path).await.map_err(storage_error)? {
            return Ok(None);
        }
        if let Some(location) = self.storage.public_url(path) {
            return Ok(Some(Hit::Public(location)));
        }
        match self.storage.open_read(path).await {
            Ok(object) => Ok(Some(Hit::Stored(object))),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(storage_error(e)),
        }
    }
}

enum Hit {
    Public(Url),
    Stored(StoredObject),
}

fn origin_error(e: OriginError) -> AppError {
    if e.is_not_found() {
        return AppError::NotFound("file not found at origin".to_string());
    }
    match e {
        OriginError::Timeout { .. } => AppError::GatewayTimeout(e.to_string()),
        OriginError::Status { .. } | OriginError::Transport { .. } => {
            AppError::UpstreamError(e.to_string())
        }
        OriginError::InvalidUrl(_) | OriginError::Config(_) => AppError::Internal(e.to_string()),
    }
}

fn storage_error(e: StorageError) -> AppError {
    match e {
        StorageError::InvalidPath(_) => AppError::Internal(e.to_string()),
        other => AppError::ServiceUnavailable(format!("storage {}", other)),
    }
}
