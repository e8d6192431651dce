use std::time::Duration;

/// Linear reconnect schedule for the live channel.
///
/// Deliberately more eager than the request executor's exponential backoff:
/// attempt `n` waits `interval × n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub interval: Duration,
    /// Consecutive reconnects allowed before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(3000),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.interval.saturating_mul(attempt)
    }

    /// Whether another reconnect may be scheduled after `attempts_so_far` consecutive ones.
    pub fn allows(&self, attempts_so_far: u32) -> bool {
        attempts_so_far < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_delay() {
        let policy = ReconnectPolicy::new(Duration::from_millis(3000), 5);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(3000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(6000));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(15000));
    }

    #[test]
    fn test_allows_up_to_cap() {
        let policy = ReconnectPolicy::new(Duration::from_secs(1), 2);
        assert!(policy.allows(0));
        assert!(policy.allows(1));
        assert!(!policy.allows(2));
        assert!(!ReconnectPolicy::new(Duration::from_secs(1), 0).allows(0));
    }
}
