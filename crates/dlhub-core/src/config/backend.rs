//! Storage backend configuration.

use serde::{Deserialize, Serialize};

/// Backend shared by the queue, the status store, and the connection registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend type: `"memory"` (single process) or `"redis"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Redis connection settings.
    #[serde(default)]
    pub redis: RedisConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            redis: RedisConfig::default(),
        }
    }
}

/// Redis connection settings; the queue connection target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Prefix applied to every key DLHub writes.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_key_prefix() -> String {
    "dlhub:".to_string()
}
