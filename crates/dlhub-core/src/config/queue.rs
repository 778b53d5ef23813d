//! Job queue configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delivery, backoff, and retention policy for the job queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Maximum delivery attempts per job.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for exponential backoff, in milliseconds.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    /// Age after which completed jobs are purged.
    #[serde(default = "default_completed_age")]
    pub completed_retention_seconds: u64,
    /// Maximum number of completed jobs kept.
    #[serde(default = "default_completed_count")]
    pub completed_retention_count: usize,
    /// Age after which failed jobs are purged.
    #[serde(default = "default_failed_age")]
    pub failed_retention_seconds: u64,
    /// Visibility lease for a claimed job; renewed while the job runs.
    #[serde(default = "default_lease")]
    pub lease_seconds: u64,
}

impl QueueConfig {
    /// Base backoff delay.
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Claim lease duration.
    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_seconds)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base(),
            completed_retention_seconds: default_completed_age(),
            completed_retention_count: default_completed_count(),
            failed_retention_seconds: default_failed_age(),
            lease_seconds: default_lease(),
        }
    }
}

fn default_name() -> String {
    "downloads".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    2000
}

fn default_completed_age() -> u64 {
    86_400
}

fn default_completed_count() -> usize {
    1000
}

fn default_failed_age() -> u64 {
    604_800
}

fn default_lease() -> u64 {
    300
}
