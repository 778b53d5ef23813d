//! Per-file unit of work.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use dlhub_core::config::SimulationConfig;

/// Processes a single file of a download job.
#[async_trait]
pub trait UnitOfWork: Send + Sync + std::fmt::Debug {
    /// Fetch one file. Returns its size in bytes, or a failure description.
    async fn fetch(&self, job_id: &str, file_id: i64) -> Result<u64, String>;
}

/// Stand-in for real file retrieval: sleeps for a random delay and reports
/// a random size.
#[derive(Debug, Clone)]
pub struct SimulatedFetcher {
    config: SimulationConfig,
}

impl SimulatedFetcher {
    /// Create a fetcher with the configured delay, size, and failure ranges.
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    fn roll(&self) -> (Duration, u64, bool) {
        let mut rng = rand::thread_rng();
        let delay = rng.gen_range(self.config.delay_min_ms..=self.config.delay_max_ms);
        let size = rng.gen_range(self.config.size_min_bytes..=self.config.size_max_bytes);
        let fails = rng.gen_bool(self.config.failure_rate.clamp(0.0, 1.0));
        (Duration::from_millis(delay), size, fails)
    }
}

#[async_trait]
impl UnitOfWork for SimulatedFetcher {
    async fn fetch(&self, job_id: &str, file_id: i64) -> Result<u64, String> {
        let (delay, size, fails) = self.roll();
        tracing::debug!(
            "Fetching file {} for job {} (simulated, {:?})",
            file_id,
            job_id,
            delay
        );
        tokio::time::sleep(delay).await;

        if fails {
            return Err(format!("simulated transfer error for file {file_id}"));
        }
        Ok(size)
    }
}
