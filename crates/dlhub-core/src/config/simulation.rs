//! Simulated file retrieval configuration.

use serde::{Deserialize, Serialize};

/// Bounds for the simulated per-file unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Minimum per-file latency in milliseconds.
    #[serde(default = "default_delay_min")]
    pub delay_min_ms: u64,
    /// Maximum per-file latency in milliseconds.
    #[serde(default = "default_delay_max")]
    pub delay_max_ms: u64,
    /// Smallest synthetic file size.
    #[serde(default = "default_size_min")]
    pub size_min_bytes: u64,
    /// Largest synthetic file size.
    #[serde(default = "default_size_max")]
    pub size_max_bytes: u64,
    /// Probability that a file retrieval fails.
    #[serde(default)]
    pub failure_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            delay_min_ms: default_delay_min(),
            delay_max_ms: default_delay_max(),
            size_min_bytes: default_size_min(),
            size_max_bytes: default_size_max(),
            failure_rate: 0.0,
        }
    }
}

fn default_delay_min() -> u64 {
    10_000
}

fn default_delay_max() -> u64 {
    120_000
}

fn default_size_min() -> u64 {
    1000
}

fn default_size_max() -> u64 {
    10_001_000
}
