//! Status store configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Status store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Record retention window, re-armed on every write.
    #[serde(default = "default_retention")]
    pub retention_seconds: u64,
    /// Maximum number of records held by the in-memory store.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    /// Base URL for completion artifact references.
    #[serde(default = "default_download_base_url")]
    pub download_base_url: String,
}

impl StatusConfig {
    /// Retention window.
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            retention_seconds: default_retention(),
            max_capacity: default_max_capacity(),
            download_base_url: default_download_base_url(),
        }
    }
}

fn default_retention() -> u64 {
    604_800
}

fn default_max_capacity() -> u64 {
    100_000
}

fn default_download_base_url() -> String {
    "https://storage.example.com/jobs".to_string()
}
