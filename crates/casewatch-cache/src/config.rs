//! Polling cache configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Polling cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Hard per-request timeout as a multiple of the entry's refresh interval.
    #[serde(default = "default_timeout_multiplier")]
    pub timeout_multiplier: u32,
    /// Lower bound for the per-request timeout (ms).
    #[serde(default = "default_min_request_timeout_ms")]
    pub min_request_timeout_ms: u64,
    /// Lower bound for refresh intervals (ms). Shorter requests are clamped.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

fn default_timeout_multiplier() -> u32 {
    3
}

fn default_min_request_timeout_ms() -> u64 {
    5_000
}

fn default_min_interval_ms() -> u64 {
    100
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            timeout_multiplier: default_timeout_multiplier(),
            min_request_timeout_ms: default_min_request_timeout_ms(),
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

impl CacheConfig {
    /// Timeout for a fetch on an entry refreshing every `interval`.
    pub fn request_timeout(&self, interval: Duration) -> Duration {
        interval
            .saturating_mul(self.timeout_multiplier.max(1))
            .max(Duration::from_millis(self.min_request_timeout_ms))
    }

    /// Clamp a requested refresh interval to the configured floor.
    pub fn clamp_interval(&self, interval: Duration) -> Duration {
        interval.max(Duration::from_millis(self.min_interval_ms.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_timeout_scales_with_interval() {
        let config = CacheConfig::default();
        assert_eq!(
            config.request_timeout(Duration::from_secs(10)),
            Duration::from_secs(30)
        );
        assert_eq!(
            config.request_timeout(Duration::from_secs(30)),
            Duration::from_secs(90)
        );
    }

    #[test]
    fn test_request_timeout_has_floor() {
        let config = CacheConfig::default();
        assert_eq!(
            config.request_timeout(Duration::from_millis(500)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = CacheConfig::default();
        assert_eq!(
            config.clamp_interval(Duration::ZERO),
            Duration::from_millis(100)
        );
    }
}
