//! Connection registry configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Subscription registry and notifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Idle expiry of a job's subscriber set, re-armed on every subscribe.
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_seconds: u64,
    /// Buffer size of the in-process notification channel.
    #[serde(default = "default_notify_buffer")]
    pub notify_buffer: usize,
}

impl RegistryConfig {
    /// Idle expiry window.
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_seconds)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            idle_ttl_seconds: default_idle_ttl(),
            notify_buffer: default_notify_buffer(),
        }
    }
}

fn default_idle_ttl() -> u64 {
    3600
}

fn default_notify_buffer() -> usize {
    256
}
