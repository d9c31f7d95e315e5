//! Retry policy for failed uploads

use rand::Rng as _;
use std::time::Duration;

/// Bounded retries with exponential backoff and jitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt before an artifact is quarantined
    pub max_retries: u32,
    /// First backoff step; zero disables backoff entirely
    pub base_delay: Duration,
    /// Upper bound for the exponential part of the delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Policy that retries immediately
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based)
    ///
    /// Formula: `min(base * 2^(retry-1), max) + jitter(0..base)`
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        let exp_delay = self.base_delay.saturating_mul(factor);
        let capped = exp_delay.min(self.max_delay);

        let base_ms = self.base_delay.as_millis() as u64;
        let jitter = rand::thread_rng().gen_range(0..base_ms.max(1));
        capped + Duration::from_millis(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(5));
        assert_eq!(policy.max_delay, Duration::from_secs(60));
    }

    #[test]
    fn test_delay_exponential_backoff() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        };
        // retry 1: 2s + jitter in 0..2s
        let d = policy.delay_for_retry(1);
        assert!(d >= Duration::from_secs(2) && d < Duration::from_secs(4));

        // retry 2: 4s + jitter
        let d = policy.delay_for_retry(2);
        assert!(d >= Duration::from_secs(4) && d < Duration::from_secs(6));

        // retry 3: 8s + jitter
        let d = policy.delay_for_retry(3);
        assert!(d >= Duration::from_secs(8) && d < Duration::from_secs(10));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy {
            max_retries: 40,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(30),
        };
        let d = policy.delay_for_retry(40);
        assert!(d >= Duration::from_secs(30) && d < Duration::from_secs(35));
    }

    #[test]
    fn test_zero_base_disables_backoff() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(policy.delay_for_retry(1), Duration::ZERO);
        assert_eq!(policy.delay_for_retry(10), Duration::ZERO);
    }
}
