//! Job queue: durable, at-least-once delivery with backoff and leases.

pub mod backoff;
pub mod memory;
#[cfg(feature = "redis-backend")]
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing;

use dlhub_core::config::{AppConfig, QueueConfig};
use dlhub_core::error::AppError;
use dlhub_core::result::AppResult;
use dlhub_core::traits::{QueueBackend, QueueStats, RetentionPolicy};
use dlhub_entity::Envelope;
#[cfg(feature = "redis-backend")]
use dlhub_store::redis::RedisClient;

pub use backoff::BackoffPolicy;
pub use memory::MemoryQueueBackend;

/// What happened to a job whose attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackOutcome {
    /// Scheduled for another delivery after `delay`.
    Retrying {
        /// Attempt that just failed.
        attempt: u32,
        /// Backoff before the next delivery.
        delay: Duration,
    },
    /// No attempts left; moved to the failed set.
    Exhausted {
        /// Attempts made in total.
        attempts: u32,
    },
    /// The lease expired before the failure was reported; the job was
    /// already recovered by stalled-job maintenance.
    LeaseLost,
}

/// Job queue facade over a [`QueueBackend`].
#[derive(Debug, Clone)]
pub struct JobQueue {
    /// Storage backend
    backend: Arc<dyn QueueBackend>,
    /// Queue name, for logs
    name: String,
    /// Delivery attempt ceiling for new jobs
    max_attempts: u32,
    /// Delay between attempts
    backoff: BackoffPolicy,
    /// Claim lease duration
    lease: Duration,
    /// Finished-job retention
    retention: RetentionPolicy,
}

impl JobQueue {
    /// Create a queue over the given backend.
    pub fn new(backend: Arc<dyn QueueBackend>, config: &QueueConfig) -> Self {
        Self {
            backend,
            name: config.name.clone(),
            max_attempts: config.max_attempts,
            backoff: BackoffPolicy::exponential(config.backoff_base()),
            lease: config.lease(),
            retention: RetentionPolicy::from(config),
        }
    }

    /// Build the queue for the configured backend provider.
    pub fn from_config(
        config: &AppConfig,
        #[cfg(feature = "redis-backend")] redis: Option<&RedisClient>,
    ) -> AppResult<Self> {
        let backend: Arc<dyn QueueBackend> = match config.backend.provider.as_str() {
            "memory" => Arc::new(MemoryQueueBackend::new()),
            #[cfg(feature = "redis-backend")]
            "redis" => {
                let client = redis.ok_or_else(|| {
                    AppError::configuration("Redis queue requires a connected Redis client")
                })?;
                Arc::new(self::redis::RedisQueueBackend::new(
                    client.clone(),
                    &config.queue.name,
                ))
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown queue backend provider: '{other}'"
                )));
            }
        };

        tracing::info!(
            "Job queue '{}' initialized with provider='{}', max_attempts={}",
            config.queue.name,
            config.backend.provider,
            config.queue.max_attempts
        );
        Ok(Self::new(backend, &config.queue))
    }

    /// Claim lease duration.
    pub fn lease(&self) -> Duration {
        self.lease
    }

    /// Queue name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue a payload under `id`. Fails with a conflict if `id` is taken.
    pub async fn submit<T: Serialize>(&self, id: &str, payload: &T) -> AppResult<Envelope> {
        let envelope = Envelope::new(id, serde_json::to_value(payload)?, self.max_attempts);
        if !self.backend.push(envelope.clone()).await? {
            return Err(AppError::conflict(format!(
                "Job '{id}' is already queued in '{}'",
                self.name
            )));
        }
        tracing::debug!("Enqueued job: id={}, queue='{}'", id, self.name);
        Ok(envelope)
    }

    /// Claim the next ready job, if any.
    pub async fn claim(&self) -> AppResult<Option<Envelope>> {
        self.backend.claim(self.lease).await
    }

    /// Keep the lease of an in-flight job alive.
    pub async fn extend_lease(&self, id: &str) -> AppResult<bool> {
        self.backend.extend_lease(id, self.lease).await
    }

    /// Acknowledge a successfully processed job.
    pub async fn ack(&self, id: &str) -> AppResult<bool> {
        let settled = self.backend.complete(id).await?;
        if !settled {
            tracing::warn!("Ack for job {} ignored: lease no longer held", id);
        }
        self.purge_quietly().await;
        Ok(settled)
    }

    /// Report a failed attempt. Schedules a retry with backoff while
    /// attempts remain, otherwise fails the job.
    pub async fn nack(&self, envelope: &Envelope, error: &str) -> AppResult<NackOutcome> {
        if envelope.has_attempts_left() {
            let delay = self.backoff.delay_for(envelope.attempts_made);
            if !self.backend.retry_after(&envelope.id, delay, error).await? {
                return Ok(NackOutcome::LeaseLost);
            }
            return Ok(NackOutcome::Retrying {
                attempt: envelope.attempts_made,
                delay,
            });
        }

        if !self.backend.fail(&envelope.id, error).await? {
            return Ok(NackOutcome::LeaseLost);
        }
        self.purge_quietly().await;
        Ok(NackOutcome::Exhausted {
            attempts: envelope.attempts_made,
        })
    }

    /// Fail a job immediately without further attempts.
    pub async fn fail(&self, id: &str, error: &str) -> AppResult<bool> {
        let settled = self.backend.fail(id, error).await?;
        self.purge_quietly().await;
        Ok(settled)
    }

    /// Requeue jobs whose lease expired. Returns the jobs that ran out of
    /// attempts and were failed instead.
    pub async fn recover_stalled(&self) -> AppResult<Vec<Envelope>> {
        let exhausted = self.backend.recover_stalled().await?;
        if !exhausted.is_empty() {
            tracing::warn!(
                "Queue '{}': {} stalled job(s) ran out of attempts",
                self.name,
                exhausted.len()
            );
        }
        Ok(exhausted)
    }

    /// Apply the retention policy to finished jobs.
    pub async fn purge_retention(&self) -> AppResult<u64> {
        self.backend.purge(&self.retention).await
    }

    async fn purge_quietly(&self) {
        match self.purge_retention().await {
            Ok(0) => {}
            Ok(n) => tracing::debug!("Queue '{}': purged {} finished job(s)", self.name, n),
            Err(e) => tracing::warn!("Queue '{}': retention purge failed: {}", self.name, e),
        }
    }

    /// Queue statistics.
    pub async fn stats(&self) -> AppResult<QueueStats> {
        self.backend.stats().await
    }

    /// Inspect a job by id.
    pub async fn get(&self, id: &str) -> AppResult<Option<Envelope>> {
        self.backend.get(id).await
    }

    /// Check that the backend is reachable.
    pub async fn health_check(&self) -> AppResult<bool> {
        self.backend.health_check().await
    }
}
