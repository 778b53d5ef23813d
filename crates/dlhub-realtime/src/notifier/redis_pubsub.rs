//! Redis pub/sub notifier for multi-node deployments.

use async_trait::async_trait;
use redis::AsyncCommands;

use dlhub_core::error::{AppError, ErrorKind};
use dlhub_core::result::AppResult;
use dlhub_core::traits::ProgressNotifier;
use dlhub_entity::ProgressEvent;
use dlhub_store::keys;
use dlhub_store::redis::RedisClient;

/// Publishes each event as JSON on the subscriber's channel.
#[derive(Debug, Clone)]
pub struct RedisNotifier {
    /// Redis client.
    client: RedisClient,
}

impl RedisNotifier {
    /// Creates a new Redis notifier.
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProgressNotifier for RedisNotifier {
    async fn notify(&self, subscriber_id: &str, event: &ProgressEvent) -> AppResult<()> {
        let channel = self
            .client
            .prefixed_key(&keys::subscriber_channel(subscriber_id));
        let message = serde_json::to_string(event)?;
        let mut conn = self.client.conn_mut();
        let _: i64 = conn.publish(&channel, message).await.map_err(|e| {
            AppError::with_source(ErrorKind::Registry, format!("Redis PUBLISH failed: {e}"), e)
        })?;
        Ok(())
    }
}
