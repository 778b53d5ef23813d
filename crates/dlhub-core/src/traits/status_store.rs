//! Status store trait for durable, TTL-bounded job records.

use async_trait::async_trait;

use dlhub_entity::{JobStatus, StatusPatch};

use crate::result::AppResult;

/// Durable keyed state for each job.
///
/// Writers are serialized per job id by queue ownership, so implementations
/// only need overwrite-latest-wins semantics. Every write re-arms the
/// record's retention window; expired records are invisible to readers.
#[async_trait]
pub trait StatusStore: Send + Sync + std::fmt::Debug + 'static {
    /// Merge `patch` into the record (creating it if absent), refresh
    /// `updatedAt`, re-arm expiry, and return the stored result.
    ///
    /// Fails with a `Conflict` error if the patch would move the record out
    /// of a terminal stage or backwards through the lifecycle.
    async fn upsert(&self, job_id: &str, patch: StatusPatch) -> AppResult<JobStatus>;

    /// Read one record. `None` if unknown or expired.
    async fn get(&self, job_id: &str) -> AppResult<Option<JobStatus>>;

    /// Every live record. Intended for operational tooling.
    async fn list_all(&self) -> AppResult<Vec<JobStatus>>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
