/*!
 * Bounded exponential backoff.
 */

use std::time::Duration;

use crate::errors::ErrorKind;

/// Retry ceiling and backoff curve for backend requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay after the first failure
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Delay before retry number `attempt + 1`, or `None` to give up.
    ///
    /// `attempt` counts the failures seen so far, starting at 0. Rate
    /// limits wait twice as long as other retryable errors.
    pub fn next_delay(&self, attempt: u32, kind: ErrorKind) -> Option<Duration> {
        if kind == ErrorKind::Terminal || attempt >= self.max_retries {
            return None;
        }
        let exponent = match kind {
            ErrorKind::RateLimited => attempt.saturating_add(1),
            _ => attempt,
        }
        .min(20);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        Some(delay.min(self.max_delay))
    }
}
