//! Progress fan-out: look up subscribers and deliver to each.

use std::sync::Arc;

use tracing::{debug, warn};

use dlhub_core::traits::{ConnectionRegistry, ProgressNotifier};
use dlhub_entity::ProgressEvent;

/// Delivers progress events to every live subscriber of a job.
///
/// Delivery is best effort; failures are logged and never fail the job.
#[derive(Debug, Clone)]
pub struct ProgressFanout {
    registry: Arc<dyn ConnectionRegistry>,
    notifier: Arc<dyn ProgressNotifier>,
}

impl ProgressFanout {
    /// Combine a registry and a notifier.
    pub fn new(registry: Arc<dyn ConnectionRegistry>, notifier: Arc<dyn ProgressNotifier>) -> Self {
        Self { registry, notifier }
    }

    /// Deliver `event` to every subscriber of its job. Returns the count delivered.
    pub async fn publish(&self, event: &ProgressEvent) -> usize {
        let subscribers = match self.registry.list_subscribers(&event.job_id).await {
            Ok(subs) => subs,
            Err(e) => {
                warn!(job_id = %event.job_id, error = %e, "Failed to list subscribers");
                return 0;
            }
        };

        let mut delivered = 0;
        for subscriber_id in &subscribers {
            match self.notifier.notify(subscriber_id, event).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    job_id = %event.job_id,
                    subscriber_id = %subscriber_id,
                    error = %e,
                    "Progress delivery failed"
                ),
            }
        }

        debug!(
            job_id = %event.job_id,
            percentage = event.progress.percentage,
            delivered,
            "Progress published"
        );
        delivered
    }
}
