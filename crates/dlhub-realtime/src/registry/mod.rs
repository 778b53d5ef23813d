//! Connection registry implementations.

pub mod memory;
#[cfg(feature = "redis-backend")]
pub mod redis;

use std::sync::Arc;

use tracing::info;

use dlhub_core::config::AppConfig;
use dlhub_core::error::AppError;
use dlhub_core::result::AppResult;
use dlhub_core::traits::ConnectionRegistry;

pub use memory::MemoryConnectionRegistry;
#[cfg(feature = "redis-backend")]
pub use self::redis::RedisConnectionRegistry;

/// Build the registry selected by `backend.provider`.
pub fn from_config(
    config: &AppConfig,
    #[cfg(feature = "redis-backend")] redis: Option<&dlhub_store::redis::RedisClient>,
) -> AppResult<Arc<dyn ConnectionRegistry>> {
    match config.backend.provider.as_str() {
        #[cfg(feature = "redis-backend")]
        "redis" => {
            info!("Initializing Redis connection registry");
            let client = redis.ok_or_else(|| {
                AppError::configuration("Redis connection registry requires a Redis connection")
            })?;
            Ok(Arc::new(RedisConnectionRegistry::new(
                client.clone(),
                &config.registry,
            )))
        }
        "memory" => {
            info!("Initializing in-memory connection registry");
            Ok(Arc::new(MemoryConnectionRegistry::new(&config.registry)))
        }
        other => Err(AppError::configuration(format!(
            "Unknown registry provider: '{other}'. Supported: memory, redis"
        ))),
    }
}
