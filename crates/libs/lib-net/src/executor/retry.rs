//! Bounded retry with exponential backoff.

use std::time::Duration;

use lib_core::FailureKind;

/// Largest exponent applied to the base delay; keeps the shift in range.
const MAX_BACKOFF_EXPONENT: u32 = 20;

/// How many times a request is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Never below 1.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay before retry number `retry` (1-based): `base_delay × 2^(retry-1)`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Whether a failure of `kind` after `attempts` attempts earns another try.
    pub fn should_retry(&self, kind: FailureKind, attempts: u32) -> bool {
        kind.is_retryable() && attempts < self.max_attempts
    }
}
