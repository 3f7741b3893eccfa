//! # API Configuration
//!
//! Loaded once at startup from environment variables.

use std::fmt;

use thiserror::Error;
use url::Url;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_PUBLIC_URL: &str = "http://localhost:8080/";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid PORT value {0:?}")]
    InvalidPort(String),

    #[error("invalid URL in {0}: {1}")]
    InvalidUrl(&'static str, String),

    #[error("invalid MIRROR_LOG_FORMAT {0:?} (expected \"text\" or \"json\")")]
    InvalidLogFormat(String),
}

/// Application configuration.
///
/// Custom `Debug` redacts the `auth_token` to prevent credential leakage in logs.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Static bearer token. If `None`, authentication is disabled.
    pub auth_token: Option<String>,
    /// Externally visible base URL, used for `download_link` values.
    /// Always ends with `/`.
    pub public_url: Url,
    /// Mount `/metrics` and the request metrics middleware.
    pub metrics_enabled: bool,
    pub log_format: LogFormat,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("public_url", &self.public_url.as_str())
            .field("metrics_enabled", &self.metrics_enabled)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            None => DEFAULT_PORT,
        };

        let auth_token = lookup("MIRROR_AUTH_TOKEN").filter(|t| !t.is_empty());

        let raw_url = lookup("MIRROR_PUBLIC_URL").unwrap_or_else(|| DEFAULT_PUBLIC_URL.to_string());
        let public_url = parse_base_url(&raw_url)?;

        // Enabled unless explicitly "false".
        let metrics_enabled = lookup("MIRROR_METRICS_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let log_format = match lookup("MIRROR_LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(ConfigError::InvalidLogFormat(other.to_string())),
        };

        Ok(Self {
            port,
            auth_token,
            public_url,
            metrics_enabled,
            log_format,
        })
    }

    /// Absolute URL at which this mirror serves `path`.
    pub fn public_link(&self, path: &str) -> String {
        self.public_url
            .join(path.trim_start_matches('/'))
            .map(String::from)
            .unwrap_or_else(|_| format!("{}{}", self.public_url, path.trim_start_matches('/')))
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidUrl("MIRROR_PUBLIC_URL", e.to_string()))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.auth_token.is_none());
        assert_eq!(config.public_url.as_str(), "http://localhost:8080/");
        assert!(config.metrics_enabled);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("PORT", "9000"),
            ("MIRROR_AUTH_TOKEN", "s3cret"),
            ("MIRROR_PUBLIC_URL", "https://mirror.example.com/wp"),
            ("MIRROR_METRICS_ENABLED", "FALSE"),
            ("MIRROR_LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.auth_token.as_deref(), Some("s3cret"));
        assert_eq!(config.public_url.as_str(), "https://mirror.example.com/wp/");
        assert!(!config.metrics_enabled);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn empty_token_disables_auth() {
        assert!(load(&[("MIRROR_AUTH_TOKEN", "")]).unwrap().auth_token.is_none());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(load(&[("PORT", "eighty")]), Err(ConfigError::InvalidPort(_))));
        assert!(matches!(
            load(&[("MIRROR_PUBLIC_URL", "not a url")]),
            Err(ConfigError::InvalidUrl(..))
        ));
        assert!(matches!(
            load(&[("MIRROR_LOG_FORMAT", "xml")]),
            Err(ConfigError::InvalidLogFormat(_))
        ));
    }

    #[test]
    fn public_links_join_under_base_path() {
        let config = load(&[("MIRROR_PUBLIC_URL", "https://mirror.example.com/wp")]).unwrap();
        assert_eq!(
            config.public_link("/plugin/akismet.5.3.zip"),
            "https://mirror.example.com/wp/plugin/akismet.5.3.zip"
        );
    }

    #[test]
    fn debug_redacts_token() {
        let config = load(&[("MIRROR_AUTH_TOKEN", "s3cret")]).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
