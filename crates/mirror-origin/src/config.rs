//! Origin client configuration.
//!
//! Defaults point to the public origin hosts. Override via environment
//! variables or explicit construction for testing.

use std::time::Duration;

use url::Url;

/// Default user agent sent to the origin.
pub const DEFAULT_USER_AGENT: &str = concat!("asset-mirror/", env!("CARGO_PKG_VERSION"));

/// Base URLs and limits for origin requests.
#[derive(Debug, Clone)]
pub struct OriginConfig {
    /// Core release host. Default: <https://wordpress.org/>
    pub core_url: Url,
    /// Plugin and theme archive host. Default: <https://downloads.wordpress.org/>
    pub downloads_url: Url,
    /// Plugin image asset host. Default: <https://ps.w.org/>
    pub assets_url: Url,
    /// Bound on the response head and on each body stall.
    pub timeout: Duration,
    pub user_agent: String,
}

impl OriginConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `MIRROR_ORIGIN_CORE_URL` (default: `https://wordpress.org`)
    /// - `MIRROR_ORIGIN_DOWNLOADS_URL` (default: `https://downloads.wordpress.org`)
    /// - `MIRROR_ORIGIN_ASSETS_URL` (default: `https://ps.w.org`)
    /// - `MIRROR_ORIGIN_TIMEOUT_SECS` (default: 60)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = |var: &str, default: &str| -> Result<Url, ConfigError> {
            let raw = lookup(var).unwrap_or_else(|| default.to_string());
            Url::parse(&raw)
                .map(with_trailing_slash)
                .map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
        };
        let timeout_secs = match lookup("MIRROR_ORIGIN_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidTimeout(raw))?,
            None => 60,
        };
        Ok(Self {
            core_url: url("MIRROR_ORIGIN_CORE_URL", "https://wordpress.org")?,
            downloads_url: url("MIRROR_ORIGIN_DOWNLOADS_URL", "https://downloads.wordpress.org")?,
            assets_url: url("MIRROR_ORIGIN_ASSETS_URL", "https://ps.w.org")?,
            timeout: Duration::from_secs(timeout_secs),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        })
    }

    /// Point every host family at one base URL (a local mock server).
    pub fn single_host(base: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let url = Url::parse(base)
            .map(with_trailing_slash)
            .map_err(|e| ConfigError::InvalidUrl(base.to_string(), e.to_string()))?;
        Ok(Self {
            core_url: url.clone(),
            downloads_url: url.clone(),
            assets_url: url,
            timeout,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        })
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("MIRROR_ORIGIN_TIMEOUT_SECS must be a positive integer, got {0:?}")]
    InvalidTimeout(String),
}
