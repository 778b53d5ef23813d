//! In-memory status store using the moka crate.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use moka::Expiry;
use moka::future::Cache;
use tracing::debug;

use dlhub_core::config::StatusConfig;
use dlhub_core::result::AppResult;
use dlhub_core::traits::StatusStore;
use dlhub_entity::{JobStatus, StatusPatch};

/// A record plus the instant its retention window closes.
#[derive(Debug, Clone)]
struct Stored {
    record: JobStatus,
    ttl: Duration,
    deadline: Instant,
}

impl Stored {
    fn is_live(&self, now: Instant) -> bool {
        now < self.deadline
    }
}

/// Re-arms each entry's expiry with its own TTL on every write.
struct RetentionExpiry;

impl Expiry<String, Stored> for RetentionExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Stored,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Stored,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory status store using moka.
#[derive(Debug, Clone)]
pub struct MemoryStatusStore {
    /// Job id → stored record.
    cache: Cache<String, Stored>,
    /// Retention window applied on every write.
    retention: Duration,
}

impl MemoryStatusStore {
    /// Create a new in-memory store from configuration.
    pub fn new(config: &StatusConfig) -> Self {
        Self::with_retention(config.max_capacity, config.retention())
    }

    /// Create a store with an explicit retention window.
    pub fn with_retention(max_capacity: u64, retention: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(RetentionExpiry)
            .build();

        Self { cache, retention }
    }

    async fn live(&self, job_id: &str) -> Option<JobStatus> {
        self.cache
            .get(job_id)
            .await
            .filter(|stored| stored.is_live(Instant::now()))
            .map(|stored| stored.record)
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn upsert(&self, job_id: &str, patch: StatusPatch) -> AppResult<JobStatus> {
        let current = self.live(job_id).await;
        let record = patch.apply(job_id, current, Utc::now())?;

        self.cache
            .insert(
                job_id.to_string(),
                Stored {
                    record: record.clone(),
                    ttl: self.retention,
                    deadline: Instant::now() + self.retention,
                },
            )
            .await;

        debug!(job_id, status = %record.status, current = record.progress.current, "Status upserted");
        Ok(record)
    }

    async fn get(&self, job_id: &str) -> AppResult<Option<JobStatus>> {
        Ok(self.live(job_id).await)
    }

    async fn list_all(&self) -> AppResult<Vec<JobStatus>> {
        let now = Instant::now();
        let mut records: Vec<JobStatus> = self
            .cache
            .iter()
            .filter(|(_, stored)| stored.is_live(now))
            .map(|(_, stored)| stored.record)
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
