//! Bounded local retries for transient infrastructure errors.

use std::future::Future;
use std::time::Duration;

use crate::config::WorkerConfig;
use crate::result::AppResult;

/// Retry policy for store and registry writes.
#[derive(Debug, Clone, Copy)]
pub struct WriteRetry {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl WriteRetry {
    /// Create a retry policy.
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Policy from `worker.store_write_attempts` and `worker.store_retry_delay_ms`.
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(
            config.store_write_attempts,
            Duration::from_millis(config.store_retry_delay_ms),
        )
    }

    /// Run `op`, retrying transient failures up to the attempt limit.
    ///
    /// Non-transient errors surface immediately.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    tracing::warn!(
                        operation = what,
                        attempt,
                        max_attempts = self.attempts,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for WriteRetry {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}
