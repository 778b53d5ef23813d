//! Subscription service: who wants progress events for which job.

use std::collections::BTreeSet;
use std::sync::Arc;

use dlhub_core::error::AppError;
use dlhub_core::result::AppResult;
use dlhub_core::traits::ConnectionRegistry;

/// Registers and removes progress subscribers on behalf of a push transport.
#[derive(Debug, Clone)]
pub struct SubscriptionService {
    /// Connection registry.
    registry: Arc<dyn ConnectionRegistry>,
}

impl SubscriptionService {
    /// Creates a new subscription service.
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Registers `subscriber_id` for progress events of `job_id`.
    pub async fn subscribe(&self, job_id: &str, subscriber_id: &str) -> AppResult<()> {
        Self::require("jobId", job_id)?;
        Self::require("subscriberId", subscriber_id)?;
        self.registry.subscribe(job_id, subscriber_id).await?;
        tracing::debug!("Subscriber {} registered for job {}", subscriber_id, job_id);
        Ok(())
    }

    /// Removes a registration. Unknown pairs are ignored.
    pub async fn unsubscribe(&self, job_id: &str, subscriber_id: &str) -> AppResult<()> {
        self.registry.unsubscribe(job_id, subscriber_id).await?;
        tracing::debug!("Subscriber {} removed from job {}", subscriber_id, job_id);
        Ok(())
    }

    /// Current subscribers of a job.
    pub async fn subscribers(&self, job_id: &str) -> AppResult<BTreeSet<String>> {
        self.registry.list_subscribers(job_id).await
    }

    fn require(field: &str, value: &str) -> AppResult<()> {
        if value.trim().is_empty() {
            return Err(AppError::validation(format!("{field} must not be empty")));
        }
        Ok(())
    }
}
