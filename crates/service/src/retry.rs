//! Bounded exponential backoff for conflicting outcome writes.

use bandit_core::config::RetryConfig;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before attempt `attempt + 1`: `base · 2^(attempt-1)`, capped,
    /// then jittered uniformly into its upper half.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let ceiling = self
            .base_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff);
        if ceiling.is_zero() {
            return ceiling;
        }
        let floor = ceiling / 2;
        rand::thread_rng().gen_range(floor..=ceiling)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_backoff: Duration::from_millis(4),
            max_backoff: Duration::from_millis(20),
        };
        for _ in 0..50 {
            let first = policy.backoff(1);
            assert!(first >= Duration::from_millis(2) && first <= Duration::from_millis(4));
            let third = policy.backoff(3);
            assert!(third >= Duration::from_millis(8) && third <= Duration::from_millis(16));
            let tenth = policy.backoff(10);
            assert!(tenth >= Duration::from_millis(10) && tenth <= Duration::from_millis(20));
        }
    }

    #[test]
    fn test_zero_attempts_clamped() {
        let policy = RetryPolicy::from_config(&RetryConfig {
            max_attempts: 0,
            base_backoff_ms: 0,
            max_backoff_ms: 0,
        });
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.backoff(3), Duration::ZERO);
    }
}
