//! Queue backend trait for durable, at-least-once job delivery.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use dlhub_entity::Envelope;

use crate::config::QueueConfig;
use crate::result::AppResult;

/// How long finished jobs stay inspectable before they are purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Maximum age of completed jobs.
    pub completed_age: Duration,
    /// Maximum number of completed jobs.
    pub completed_count: usize,
    /// Maximum age of failed jobs.
    pub failed_age: Duration,
}

impl From<&QueueConfig> for RetentionPolicy {
    fn from(config: &QueueConfig) -> Self {
        Self {
            completed_age: Duration::from_secs(config.completed_retention_seconds),
            completed_count: config.completed_retention_count,
            failed_age: Duration::from_secs(config.failed_retention_seconds),
        }
    }
}

/// Queue statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Jobs ready to be claimed.
    pub waiting: u64,
    /// Jobs waiting out a backoff delay.
    pub delayed: u64,
    /// Jobs claimed by a worker.
    pub active: u64,
    /// Retained completed jobs.
    pub completed: u64,
    /// Retained terminally failed jobs.
    pub failed: u64,
}

/// Storage primitive behind the job queue.
///
/// A claim hands a job to exactly one caller under a time-bounded lease.
/// Methods that settle a claimed job return `false` when the caller no
/// longer holds its lease (it expired and the job was recovered).
#[async_trait]
pub trait QueueBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Persist a new job. Returns `false` if the id is already known.
    async fn push(&self, envelope: Envelope) -> AppResult<bool>;

    /// Claim the next ready job, counting a delivery attempt and leasing it.
    async fn claim(&self, lease: Duration) -> AppResult<Option<Envelope>>;

    /// Extend the lease of a claimed job.
    async fn extend_lease(&self, id: &str, lease: Duration) -> AppResult<bool>;

    /// Settle a claimed job as completed.
    async fn complete(&self, id: &str) -> AppResult<bool>;

    /// Return a claimed job for redelivery after `delay`.
    async fn retry_after(&self, id: &str, delay: Duration, error: &str) -> AppResult<bool>;

    /// Settle a claimed job as terminally failed.
    async fn fail(&self, id: &str, error: &str) -> AppResult<bool>;

    /// Return expired leases to the wait list. Jobs without attempts left
    /// are moved to the failed set instead and returned to the caller.
    async fn recover_stalled(&self) -> AppResult<Vec<Envelope>>;

    /// Drop finished jobs outside the retention policy. Returns the count removed.
    async fn purge(&self, policy: &RetentionPolicy) -> AppResult<u64>;

    /// Current queue statistics.
    async fn stats(&self) -> AppResult<QueueStats>;

    /// Inspect a job by id.
    async fn get(&self, id: &str) -> AppResult<Option<Envelope>>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
