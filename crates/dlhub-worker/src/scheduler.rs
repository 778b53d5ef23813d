//! Cron scheduler for queue and registry maintenance.

use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use dlhub_core::error::AppError;
use dlhub_realtime::MemoryConnectionRegistry;

use crate::executor::JobHandler;
use crate::queue::JobQueue;
use crate::runner::recover_stalled_jobs;

/// Periodic maintenance: stalled-job recovery, retention purge, and
/// expiry of idle in-memory subscriptions
pub struct MaintenanceScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Queue being maintained
    queue: Arc<JobQueue>,
    /// Handler told about jobs that ran out of attempts
    handler: Arc<dyn JobHandler>,
    /// In-process registry to sweep, if one is in use
    registry: Option<Arc<MemoryConnectionRegistry>>,
}

impl std::fmt::Debug for MaintenanceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceScheduler")
            .field("queue", &self.queue.name())
            .finish()
    }
}

impl MaintenanceScheduler {
    /// Create a new maintenance scheduler
    pub async fn new(queue: Arc<JobQueue>, handler: Arc<dyn JobHandler>) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            queue,
            handler,
            registry: None,
        })
    }

    /// Also sweep expired subscriptions from an in-process registry
    pub fn with_registry(mut self, registry: Arc<MemoryConnectionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Register all maintenance tasks
    pub async fn register_default_tasks(&self, stalled_interval: Duration) -> Result<(), AppError> {
        self.register_stalled_recovery(stalled_interval).await?;
        self.register_retention_purge().await?;
        if self.registry.is_some() {
            self.register_registry_sweep().await?;
        }

        tracing::info!("All maintenance tasks registered");
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Maintenance scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&self) -> Result<(), AppError> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Maintenance scheduler shut down");
        Ok(())
    }

    async fn add(&self, name: &str, job: CronJob) -> Result<(), AppError> {
        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add {} schedule: {}", name, e)))?;
        Ok(())
    }

    /// Stalled-job recovery: every `interval`
    async fn register_stalled_recovery(&self, interval: Duration) -> Result<(), AppError> {
        let queue = Arc::clone(&self.queue);
        let handler = Arc::clone(&self.handler);
        let interval = interval.max(Duration::from_secs(1));

        let job = CronJob::new_repeated_async(interval, move |_uuid, _lock| {
            let queue = Arc::clone(&queue);
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                match recover_stalled_jobs(&queue, handler.as_ref()).await {
                    Ok(0) => tracing::trace!("No exhausted stalled jobs"),
                    Ok(n) => tracing::warn!("Marked {} stalled job(s) as failed", n),
                    Err(e) => tracing::error!("Stalled job recovery failed: {}", e),
                }
            })
        })
        .map_err(|e| {
            AppError::internal(format!("Failed to create stalled_recovery schedule: {}", e))
        })?;

        self.add("stalled_recovery", job).await?;
        tracing::info!("Registered: stalled_recovery (every {:?})", interval);
        Ok(())
    }

    /// Retention purge: every 5 minutes
    async fn register_retention_purge(&self) -> Result<(), AppError> {
        let queue = Arc::clone(&self.queue);

        let job = CronJob::new_async("0 */5 * * * *", move |_uuid, _lock| {
            let queue = Arc::clone(&queue);
            Box::pin(async move {
                match queue.purge_retention().await {
                    Ok(n) => tracing::debug!("Retention purge removed {} job(s)", n),
                    Err(e) => tracing::error!("Retention purge failed: {}", e),
                }
            })
        })
        .map_err(|e| {
            AppError::internal(format!("Failed to create retention_purge schedule: {}", e))
        })?;

        self.add("retention_purge", job).await?;
        tracing::info!("Registered: retention_purge (every 5min)");
        Ok(())
    }

    /// Idle subscription sweep: every 10 minutes
    async fn register_registry_sweep(&self) -> Result<(), AppError> {
        let Some(registry) = self.registry.clone() else {
            return Ok(());
        };

        let job = CronJob::new_async("0 */10 * * * *", move |_uuid, _lock| {
            let registry = Arc::clone(&registry);
            Box::pin(async move {
                let removed = registry.purge_expired();
                if removed > 0 {
                    tracing::debug!("Expired {} idle subscription set(s)", removed);
                }
            })
        })
        .map_err(|e| {
            AppError::internal(format!("Failed to create registry_sweep schedule: {}", e))
        })?;

        self.add("registry_sweep", job).await?;
        tracing::info!("Registered: registry_sweep (every 10min)");
        Ok(())
    }
}
