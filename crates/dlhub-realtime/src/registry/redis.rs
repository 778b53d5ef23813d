//! Redis connection registry: one set per job with an idle `EXPIRE`.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

use dlhub_core::config::RegistryConfig;
use dlhub_core::error::{AppError, ErrorKind};
use dlhub_core::result::AppResult;
use dlhub_core::traits::ConnectionRegistry;
use dlhub_store::keys;
use dlhub_store::redis::RedisClient;

/// Redis-backed connection registry.
#[derive(Debug, Clone)]
pub struct RedisConnectionRegistry {
    /// Redis client.
    client: RedisClient,
    /// Idle expiry window.
    idle_ttl: Duration,
}

impl RedisConnectionRegistry {
    /// Creates a new Redis registry.
    pub fn new(client: RedisClient, config: &RegistryConfig) -> Self {
        Self {
            client,
            idle_ttl: config.idle_ttl(),
        }
    }

    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Registry, format!("Redis error: {e}"), e)
    }
}

#[async_trait]
impl ConnectionRegistry for RedisConnectionRegistry {
    async fn subscribe(&self, job_id: &str, subscriber_id: &str) -> AppResult<()> {
        let key = self.client.prefixed_key(&keys::job_subscribers(job_id));
        let mut conn = self.client.conn_mut();
        let _: () = redis::pipe()
            .atomic()
            .sadd(&key, subscriber_id)
            .ignore()
            .expire(&key, self.idle_ttl.as_secs() as i64)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        debug!(job_id, subscriber_id, "Subscriber registered");
        Ok(())
    }

    async fn unsubscribe(&self, job_id: &str, subscriber_id: &str) -> AppResult<()> {
        let key = self.client.prefixed_key(&keys::job_subscribers(job_id));
        let mut conn = self.client.conn_mut();
        let _: i64 = conn.srem(&key, subscriber_id).await.map_err(Self::map_err)?;
        debug!(job_id, subscriber_id, "Subscriber removed");
        Ok(())
    }

    async fn list_subscribers(&self, job_id: &str) -> AppResult<BTreeSet<String>> {
        let key = self.client.prefixed_key(&keys::job_subscribers(job_id));
        let mut conn = self.client.conn_mut();
        let members: Vec<String> = conn.smembers(&key).await.map_err(Self::map_err)?;
        Ok(members.into_iter().collect())
    }
}
