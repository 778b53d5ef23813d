//! Exponential backoff between delivery attempts.

use std::time::Duration;

/// `delay(n) = base × 2^(n-1)` for attempt `n ≥ 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
}

impl BackoffPolicy {
    /// Create a policy with the given base delay.
    pub fn exponential(base: Duration) -> Self {
        Self { base }
    }

    /// Delay before redelivering a job whose `attempt`-th delivery failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30);
        self.base.saturating_mul(1u32 << exponent)
    }
}
