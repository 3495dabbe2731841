//! Reconnect backoff.

use std::time::Duration;

/// Default base delay (ms).
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
/// Default delay cap (ms).
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Exponential backoff: `min(base * 2^attempt, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Delay before the `attempt`-th reconnect (first reconnect is 1).
    ///
    /// attempt=1 -> 2*base, attempt=2 -> 4*base, ... capped at max.
    pub fn delay(&self, attempt: u32) -> Duration {
        // Exponent capped so the shift cannot overflow.
        let exponent = attempt.min(20);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Delay before the `attempt`-th reconnect with the default policy.
pub fn backoff_delay(attempt: u32) -> Duration {
    BackoffPolicy::default().delay(attempt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sequence() {
        let delays: Vec<u64> = (1..=6).map(|n| backoff_delay(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![2_000, 4_000, 8_000, 16_000, 30_000, 30_000]);
    }

    #[test]
    fn test_large_attempt_saturates_at_cap() {
        assert_eq!(backoff_delay(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn test_custom_policy() {
        let policy = BackoffPolicy::new(10, 50);
        assert_eq!(policy.delay(1), Duration::from_millis(20));
        assert_eq!(policy.delay(2), Duration::from_millis(40));
        assert_eq!(policy.delay(3), Duration::from_millis(50));
    }
}
