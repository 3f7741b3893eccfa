//! # Object Storage Backend
//!
//! Speaks the path-style S3-compatible protocol over plain HTTP:
//! `HEAD|GET|PUT {endpoint}/{bucket}/{key}`, with an optional bearer token.
//! A PUT either completes and the object becomes visible, or it is aborted
//! and the previous object stays in place.
//!
//! Bodies of known length are streamed with an explicit `Content-Length`;
//! a trailing check turns a short or long stream into a transport error so
//! the upload is aborted. Bodies of unknown length are buffered first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{stream, StreamExt, TryStreamExt};
use mirror_core::ByteStream;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::debug;
use url::Url;

use crate::error::StorageError;
use crate::path::validate_path;
use crate::{StorageBackend, StoredObject};

/// S3-compatible bucket accessed over HTTP.
#[derive(Clone)]
pub struct ObjectStorage {
    client: Client,
    endpoint: Url,
    bucket: String,
    token: Option<String>,
    public_base: Option<Url>,
}

impl std::fmt::Debug for ObjectStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorage")
            .field("endpoint", &self.endpoint.as_str())
            .field("bucket", &self.bucket)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("public_base", &self.public_base.as_ref().map(Url::as_str))
            .finish()
    }
}

impl ObjectStorage {
    /// Create a backend for `bucket` at `endpoint`.
    ///
    /// `public_base`, when given, is the URL objects are served from directly
    /// (a CDN or public bucket website endpoint).
    pub fn new(
        endpoint: Url,
        bucket: impl Into<String>,
        token: Option<String>,
        public_base: Option<Url>,
    ) -> Result<Self, StorageError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| StorageError::Transport {
                path: String::new(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint,
            bucket: bucket.into(),
            token,
            public_base: public_base.map(with_trailing_slash),
        })
    }

    fn object_url(&self, path: &str) -> Result<Url, StorageError> {
        validate_path(path)?;
        let base = self.endpoint.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/{}/{path}", self.bucket))
            .map_err(|_| StorageError::InvalidPath(path.to_string()))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn transport(path: &str, e: reqwest::Error) -> StorageError {
        StorageError::Transport {
            path: path.to_string(),
            message: e.to_string(),
        }
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[async_trait]
impl StorageBackend for ObjectStorage {
    fn name(&self) -> &'static str {
        "object"
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let url = self.object_url(path)?;
        let resp = self
            .authorized(self.client.head(url))
            .send()
            .await
            .map_err(|e| Self::transport(path, e))?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(StorageError::Status {
                path: path.to_string(),
                status: s.as_u16(),
            }),
        }
    }

    async fn open_read(&self, path: &str) -> Result<StoredObject, StorageError> {
        let url = self.object_url(path)?;
        let resp = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(|e| Self::transport(path, e))?;
        match resp.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => return Err(StorageError::NotFound(path.to_string())),
            s => {
                return Err(StorageError::Status {
                    path: path.to_string(),
                    status: s.as_u16(),
                })
            }
        }
        let size = resp.content_length();
        let stream = resp.bytes_stream().map_err(std::io::Error::other).boxed();
        Ok(StoredObject { size, stream })
    }

    async fn write_atomic(
        &self,
        path: &str,
        body: ByteStream,
        content_length: Option<u64>,
    ) -> Result<u64, StorageError> {
        let url = self.object_url(path)?;

        let (request, seen) = match content_length {
            Some(expected) => {
                let seen = Arc::new(AtomicU64::new(0));
                let counter = Arc::clone(&seen);
                let check = Arc::clone(&seen);
                let counted = body
                    .inspect_ok(move |chunk| {
                        counter.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                    })
                    .chain(stream::once(async move {
                        let actual = check.load(Ordering::Relaxed);
                        if actual == expected {
                            Ok(Bytes::new())
                        } else {
                            Err(std::io::Error::new(
                                std::io::ErrorKind::UnexpectedEof,
                                format!("expected {expected} bytes, got {actual}"),
                            ))
                        }
                    }));
                let request = self
                    .client
                    .put(url)
                    .header(CONTENT_LENGTH, expected)
                    .body(reqwest::Body::wrap_stream(counted));
                (request, seen)
            }
            None => {
                let buffered = body
                    .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                        acc.extend_from_slice(&chunk);
                        Ok(acc)
                    })
                    .await
                    .map_err(|e| StorageError::io(path, e))?
                    .freeze();
                let len = buffered.len() as u64;
                let request = self
                    .client
                    .put(url)
                    .header(CONTENT_LENGTH, len)
                    .body(buffered);
                (request, Arc::new(AtomicU64::new(len)))
            }
        };

        let resp = match self.authorized(request).send().await {
            Ok(resp) => resp,
            Err(e) => {
                let actual = seen.load(Ordering::Relaxed);
                if let Some(expected) = content_length.filter(|expected| *expected != actual) {
                    return Err(StorageError::LengthMismatch {
                        path: path.to_string(),
                        expected,
                        actual,
                    });
                }
                return Err(Self::transport(path, e));
            }
        };

        if !resp.status().is_success() {
            return Err(StorageError::Status {
                path: path.to_string(),
                status: resp.status().as_u16(),
            });
        }

        let written = seen.load(Ordering::Relaxed);
        debug!(path, bytes = written, bucket = %self.bucket, "uploaded object");
        Ok(written)
    }

    fn public_url(&self, path: &str) -> Option<Url> {
        if validate_path(path).is_err() {
            return None;
        }
        self.public_base.as_ref()?.join(path).ok()
    }
}
