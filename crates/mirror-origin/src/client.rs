//! Origin HTTP client.

use std::io;
use std::time::Duration;

use futures::{stream, StreamExt, TryStreamExt};
use mirror_core::{AssetDescriptor, ByteStream, OriginHost};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use tracing::debug;
use url::Url;

use crate::config::OriginConfig;
use crate::error::OriginError;

/// Client for the upstream origin.
#[derive(Debug, Clone)]
pub struct OriginClient {
    http: reqwest::Client,
    config: OriginConfig,
}

impl OriginClient {
    /// Create a client from configuration.
    pub fn new(config: OriginConfig) -> Result<Self, OriginError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| OriginError::Config(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &OriginConfig {
        &self.config
    }

    /// The origin URL for a descriptor.
    pub fn url_for(&self, descriptor: &AssetDescriptor) -> Result<Url, OriginError> {
        let base = match descriptor.origin_host() {
            OriginHost::Core => &self.config.core_url,
            OriginHost::Downloads => &self.config.downloads_url,
            OriginHost::Assets => &self.config.assets_url,
        };
        base.join(&descriptor.origin_path())
            .map_err(|e| OriginError::InvalidUrl(format!("{}: {e}", descriptor.origin_path())))
    }

    /// GET the descriptor's origin URL.
    ///
    /// Returns once the response head has arrived; the body is streamed
    /// from [`OriginResponse::into_stream`].
    pub async fn fetch(&self, descriptor: &AssetDescriptor) -> Result<OriginResponse, OriginError> {
        let url = self.url_for(descriptor)?;
        debug!(%url, kind = %descriptor.kind, "fetching from origin");

        let send = self.http.get(url.clone()).send();
        let resp = match tokio::time::timeout(self.config.timeout, send).await {
            Err(_) => {
                return Err(OriginError::Timeout {
                    url: url.to_string(),
                })
            }
            Ok(Err(e)) if e.is_timeout() => {
                return Err(OriginError::Timeout {
                    url: url.to_string(),
                })
            }
            Ok(Err(e)) => {
                return Err(OriginError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
            Ok(Ok(resp)) => resp,
        };

        let status = resp.status();
        if !status.is_success() {
            return Err(OriginError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(OriginResponse::new(resp, self.config.timeout))
    }
}

/// A successful origin response whose body has not been read yet.
#[derive(Debug)]
pub struct OriginResponse {
    /// URL after redirects.
    pub url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub content_disposition: Option<String>,
    idle_timeout: Duration,
    inner: reqwest::Response,
}

impl OriginResponse {
    fn new(inner: reqwest::Response, idle_timeout: Duration) -> Self {
        let header = |name: reqwest::header::HeaderName| {
            inner
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            url: inner.url().clone(),
            status: inner.status().as_u16(),
            content_type: header(CONTENT_TYPE),
            content_length: inner.content_length(),
            content_disposition: header(CONTENT_DISPOSITION),
            idle_timeout,
            inner,
        }
    }

    /// File name from `Content-Disposition: attachment; filename="..."`.
    pub fn disposition_file_name(&self) -> Option<String> {
        self.content_disposition
            .as_deref()
            .and_then(parse_disposition_file_name)
    }

    /// Last path segment of the final URL.
    pub fn final_file_name(&self) -> Option<String> {
        self.url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }

    /// Consume the response as a byte stream.
    ///
    /// A body that stalls for longer than the configured timeout ends the
    /// stream with an [`io::ErrorKind::TimedOut`] error.
    pub fn into_stream(self) -> ByteStream {
        let body = self
            .inner
            .bytes_stream()
            .map_err(|e| {
                if e.is_timeout() {
                    io::Error::new(io::ErrorKind::TimedOut, e)
                } else {
                    io::Error::other(e)
                }
            })
            .boxed();
        with_idle_timeout(body, self.idle_timeout)
    }
}

fn with_idle_timeout(body: ByteStream, idle: Duration) -> ByteStream {
    stream::unfold(Some(body), move |state| async move {
        let mut body = state?;
        match tokio::time::timeout(idle, body.next()).await {
            Ok(Some(item)) => Some((item, Some(body))),
            Ok(None) => None,
            Err(_) => Some((
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "origin body stalled",
                )),
                None,
            )),
        }
    })
    .boxed()
}

fn parse_disposition_file_name(value: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|param| {
        let (key, raw) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let name = raw.trim().trim_matches('"');
        // Keep only the last path component of whatever the origin sent.
        let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
        (!name.is_empty()).then(|| name.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_core::AssetKind;

    fn client() -> OriginClient {
        OriginClient::new(OriginConfig::from_lookup(|_| None).unwrap()).unwrap()
    }

    #[test]
    fn urls_follow_per_kind_templates() {
        let c = client();
        let core = AssetDescriptor::new(AssetKind::CoreZip, None, "wordpress-6.4.2.zip", None, None)
            .unwrap();
        assert_eq!(
            c.url_for(&core).unwrap().as_str(),
            "https://wordpress.org/wordpress-6.4.2.zip"
        );

        let theme = AssetDescriptor::new(
            AssetKind::ThemeZip,
            Some("linnet".into()),
            "linnet.1.0.zip",
            None,
            None,
        )
        .unwrap();
        assert_eq!(
            c.url_for(&theme).unwrap().as_str(),
            "https://downloads.wordpress.org/theme/linnet.1.0.zip"
        );

        let banner = AssetDescriptor::new(
            AssetKind::Banner,
            Some("akismet".into()),
            "banner-772x250.jpg",
            None,
            Some("3164133".into()),
        )
        .unwrap();
        assert_eq!(
            c.url_for(&banner).unwrap().as_str(),
            "https://ps.w.org/akismet/assets/banner-772x250.jpg?rev=3164133"
        );
    }

    #[test]
    fn disposition_file_name_parsing() {
        assert_eq!(
            parse_disposition_file_name("attachment; filename=\"akismet.5.3.zip\"").as_deref(),
            Some("akismet.5.3.zip")
        );
        assert_eq!(
            parse_disposition_file_name("attachment; FileName=hello.1.0.zip").as_deref(),
            Some("hello.1.0.zip")
        );
        assert_eq!(
            parse_disposition_file_name("attachment; filename=\"../../x.zip\"").as_deref(),
            Some("x.zip")
        );
        assert_eq!(parse_disposition_file_name("inline"), None);
    }
}
