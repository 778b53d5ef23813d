//! Progress notifiers: deliver one event to one subscriber.

pub mod broadcast;
#[cfg(feature = "redis-backend")]
pub mod redis_pubsub;

use std::sync::Arc;

use dlhub_core::config::AppConfig;
use dlhub_core::error::AppError;
use dlhub_core::result::AppResult;
use dlhub_core::traits::ProgressNotifier;

pub use broadcast::{BroadcastNotifier, Delivery};
#[cfg(feature = "redis-backend")]
pub use redis_pubsub::RedisNotifier;

/// Build the notifier selected by `backend.provider`.
///
/// The memory provider returns the in-process broadcast notifier so a
/// co-located transport can attach to it.
pub fn from_config(
    config: &AppConfig,
    broadcast: &Arc<BroadcastNotifier>,
    #[cfg(feature = "redis-backend")] redis: Option<&dlhub_store::redis::RedisClient>,
) -> AppResult<Arc<dyn ProgressNotifier>> {
    match config.backend.provider.as_str() {
        #[cfg(feature = "redis-backend")]
        "redis" => {
            let client = redis.ok_or_else(|| {
                AppError::configuration("Redis notifier requires a Redis connection")
            })?;
            Ok(Arc::new(RedisNotifier::new(client.clone())))
        }
        "memory" => Ok(Arc::clone(broadcast) as Arc<dyn ProgressNotifier>),
        other => Err(AppError::configuration(format!(
            "Unknown notifier provider: '{other}'. Supported: memory, redis"
        ))),
    }
}
