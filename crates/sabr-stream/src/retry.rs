use std::{cmp::min, time::Duration};

use crate::DemuxError;

/// Bounded exponential backoff for transient `poll` failures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Never retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Attempt 0 has no delay; attempt n waits `base * 2^(n-1)`, capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        min(self.base_delay.saturating_mul(factor), self.max_delay)
    }

    /// `attempt` counts failures already retried.
    pub fn should_retry(&self, error: &DemuxError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_retryable()
    }
}
