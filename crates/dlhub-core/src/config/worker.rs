//! Worker pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent execution slots.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Maximum dequeues per rate-limit window.
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: u32,
    /// Rate-limit window length in milliseconds.
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_ms: u64,
    /// Pause between polls of an empty queue, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// How long shutdown waits for in-flight jobs.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
    /// Attempts for each status write before surfacing the error.
    #[serde(default = "default_store_attempts")]
    pub store_write_attempts: u32,
    /// Pause between status write attempts, in milliseconds.
    #[serde(default = "default_store_retry_delay")]
    pub store_retry_delay_ms: u64,
    /// Interval between stalled-job recovery sweeps.
    #[serde(default = "default_stalled_interval")]
    pub stalled_check_interval_seconds: u64,
}

impl WorkerConfig {
    /// Rate-limit window.
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    /// Empty-queue poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Shutdown grace period.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            rate_limit_max: default_rate_limit_max(),
            rate_limit_window_ms: default_rate_limit_window(),
            poll_interval_ms: default_poll_interval(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
            store_write_attempts: default_store_attempts(),
            store_retry_delay_ms: default_store_retry_delay(),
            stalled_check_interval_seconds: default_stalled_interval(),
        }
    }
}

fn default_concurrency() -> usize {
    3
}

fn default_rate_limit_max() -> u32 {
    50
}

fn default_rate_limit_window() -> u64 {
    1000
}

fn default_poll_interval() -> u64 {
    500
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_store_attempts() -> u32 {
    3
}

fn default_store_retry_delay() -> u64 {
    100
}

fn default_stalled_interval() -> u64 {
    30
}
