//! Retry policy with exponential backoff for population attempts.
//!
//! Delays double from the base per failed attempt and are capped:
//! 500ms → 1s → 2s → 4s → … → 30s. After `max_attempts` failed attempts the
//! task is dead-lettered.

use std::time::Duration;

/// Base delay before the first retry.
const BASE_DELAY_MS: u64 = 500;

/// Upper bound on any single delay.
const MAX_DELAY_MS: u64 = 30_000;

/// Default number of attempts before dead-lettering.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// No delay between attempts. For tests and manual drains.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Delay before retrying after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay)
    }

    /// Whether another attempt is allowed after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
