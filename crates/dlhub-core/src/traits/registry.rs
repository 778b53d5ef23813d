//! Connection registry and progress notification traits.

use std::collections::BTreeSet;

use async_trait::async_trait;

use dlhub_entity::ProgressEvent;

use crate::result::AppResult;

/// Per-job set of subscriber identifiers awaiting progress notifications.
///
/// Membership expires after an idle window even without an explicit
/// unsubscribe.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync + std::fmt::Debug + 'static {
    /// Register interest of `subscriber_id` in `job_id`, re-arming the idle window.
    async fn subscribe(&self, job_id: &str, subscriber_id: &str) -> AppResult<()>;

    /// Remove a subscription. Removing an absent one is not an error.
    async fn unsubscribe(&self, job_id: &str, subscriber_id: &str) -> AppResult<()>;

    /// Current live subscribers of a job.
    async fn list_subscribers(&self, job_id: &str) -> AppResult<BTreeSet<String>>;
}

/// Delivery of a progress event to one subscriber.
#[async_trait]
pub trait ProgressNotifier: Send + Sync + std::fmt::Debug + 'static {
    /// Deliver `event` to `subscriber_id`.
    async fn notify(&self, subscriber_id: &str, event: &ProgressEvent) -> AppResult<()>;
}
