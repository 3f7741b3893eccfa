//! Worker pool configuration.

use std::time::Duration;

use crate::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};

/// Pool size, idle polling, and retry bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            poll_interval: Duration::from_millis(1000),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `MIRROR_EMBEDDED_WORKERS` (default: 2; `0` disables in-process workers)
    /// - `MIRROR_WORKER_POLL_MS` (default: 1000)
    /// - `MIRROR_WORKER_MAX_ATTEMPTS` (default: 5)
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|raw| raw.trim().parse::<u64>().ok());
        Self {
            concurrency: parse("MIRROR_EMBEDDED_WORKERS")
                .map(|n| n as usize)
                .unwrap_or(defaults.concurrency),
            poll_interval: parse("MIRROR_WORKER_POLL_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            max_attempts: parse("MIRROR_WORKER_MAX_ATTEMPTS")
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_attempts),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_attempts(self.max_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = WorkerConfig::from_lookup(|_| None);
        assert_eq!(config, WorkerConfig::default());
        assert_eq!(config.retry_policy().max_attempts, 5);
    }

    #[test]
    fn overrides_and_garbage() {
        let config = WorkerConfig::from_lookup(|key| match key {
            "MIRROR_EMBEDDED_WORKERS" => Some("0".into()),
            "MIRROR_WORKER_POLL_MS" => Some("250".into()),
            "MIRROR_WORKER_MAX_ATTEMPTS" => Some("lots".into()),
            _ => None,
        });
        assert_eq!(config.concurrency, 0);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.max_attempts, 5);
    }
}
