//! Status store manager that dispatches to the configured provider.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use dlhub_core::config::AppConfig;
use dlhub_core::error::AppError;
use dlhub_core::result::AppResult;
use dlhub_core::traits::StatusStore;
use dlhub_entity::{JobStatus, StatusPatch};

/// Status store manager that wraps the configured provider.
#[derive(Debug, Clone)]
pub struct StatusStoreManager {
    /// The inner status store.
    inner: Arc<dyn StatusStore>,
}

impl StatusStoreManager {
    /// Create a store from configuration.
    ///
    /// The Redis provider reuses the caller's connection so the queue,
    /// store, and registry share one multiplexed client.
    pub fn new(
        config: &AppConfig,
        #[cfg(feature = "redis-backend")] redis: Option<&crate::redis::RedisClient>,
    ) -> AppResult<Self> {
        let inner: Arc<dyn StatusStore> = match config.backend.provider.as_str() {
            #[cfg(feature = "redis-backend")]
            "redis" => {
                info!("Initializing Redis status store");
                let client = redis.ok_or_else(|| {
                    AppError::configuration("Redis status store requires a Redis connection")
                })?;
                Arc::new(crate::redis::RedisStatusStore::new(
                    client.clone(),
                    &config.status,
                ))
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!("Initializing in-memory status store");
                Arc::new(crate::memory::MemoryStatusStore::new(&config.status))
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown status store provider: '{other}'. Supported: memory, redis"
                )));
            }
        };

        Ok(Self { inner })
    }
}

#[async_trait]
impl StatusStore for StatusStoreManager {
    async fn upsert(&self, job_id: &str, patch: StatusPatch) -> AppResult<JobStatus> {
        self.inner.upsert(job_id, patch).await
    }

    async fn get(&self, job_id: &str) -> AppResult<Option<JobStatus>> {
        self.inner.get(job_id).await
    }

    async fn list_all(&self) -> AppResult<Vec<JobStatus>> {
        self.inner.list_all().await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}
