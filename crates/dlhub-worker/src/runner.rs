//! Worker pool: claims jobs from the queue and runs them on bounded slots.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tokio::time;

use dlhub_core::config::WorkerConfig;
use dlhub_core::error::{AppError, ErrorKind};
use dlhub_core::result::AppResult;
use dlhub_entity::Envelope;

use crate::executor::{JobExecutionError, JobHandler};
use crate::limiter::FixedWindowLimiter;
use crate::queue::{JobQueue, NackOutcome};

/// Pool of concurrent execution slots fed by the job queue
#[derive(Debug)]
pub struct WorkerPool {
    /// Job queue to claim from
    queue: Arc<JobQueue>,
    /// Handler for claimed jobs
    handler: Arc<dyn JobHandler>,
    /// Global dequeue rate limit
    limiter: Arc<FixedWindowLimiter>,
    /// Worker configuration
    config: WorkerConfig,
    /// Worker identifier
    worker_id: String,
}

impl WorkerPool {
    /// Create a new worker pool
    pub fn new(
        queue: Arc<JobQueue>,
        handler: Arc<dyn JobHandler>,
        config: WorkerConfig,
        worker_id: String,
    ) -> Self {
        Self {
            queue,
            handler,
            limiter: Arc::new(FixedWindowLimiter::from_config(&config)),
            config,
            worker_id,
        }
    }

    /// Run until the shutdown signal flips to `true`, then wait for
    /// in-flight jobs up to the configured timeout.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Worker '{}' started with concurrency={}, rate_limit={}/{:?}, queue='{}'",
            self.worker_id,
            self.config.concurrency,
            self.config.rate_limit_max,
            self.config.rate_limit_window(),
            self.queue.name()
        );

        if let Err(e) = recover_stalled_jobs(&self.queue, self.handler.as_ref()).await {
            tracing::warn!("Worker '{}' startup recovery failed: {}", self.worker_id, e);
        }

        let slots = self.config.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(slots));

        loop {
            let permit = tokio::select! {
                _ = stopped(&mut shutdown) => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            tokio::select! {
                _ = stopped(&mut shutdown) => break,
                _ = self.limiter.acquire() => {}
            }

            match self.queue.claim().await {
                Ok(Some(envelope)) => self.dispatch(envelope, permit),
                Ok(None) => {
                    drop(permit);
                    tracing::trace!("No jobs available in queue '{}'", self.queue.name());
                    if self.idle(&mut shutdown).await {
                        break;
                    }
                }
                Err(e) => {
                    drop(permit);
                    tracing::error!("Failed to claim job: {}", e);
                    if self.idle(&mut shutdown).await {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            "Worker '{}' waiting for in-flight jobs to complete...",
            self.worker_id
        );

        let drained = time::timeout(
            self.config.shutdown_timeout(),
            semaphore.acquire_many(slots as u32),
        )
        .await;
        if drained.is_err() {
            tracing::warn!(
                "Worker '{}' shutdown timed out; unfinished jobs stay leased until recovered",
                self.worker_id
            );
        }

        tracing::info!("Worker '{}' shut down complete", self.worker_id);
    }

    /// Sleep one poll interval. Returns `true` if shutdown was requested.
    async fn idle(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = stopped(shutdown) => true,
            _ = time::sleep(self.config.poll_interval()) => false,
        }
    }

    fn dispatch(&self, envelope: Envelope, permit: OwnedSemaphorePermit) {
        let queue = Arc::clone(&self.queue);
        let handler = Arc::clone(&self.handler);

        tokio::spawn(async move {
            let _permit = permit;

            tracing::info!(
                "Processing job: id={}, type='{}', attempt={}/{}",
                envelope.id,
                handler.job_type(),
                envelope.attempts_made,
                envelope.max_attempts
            );

            let mut renewal = spawn_lease_renewal(Arc::clone(&queue), envelope.id.clone());
            let result = tokio::select! {
                result = handler.execute(&envelope) => {
                    renewal.abort();
                    result
                }
                _ = &mut renewal => {
                    // Stalled recovery owns the job now; stop touching its status.
                    tracing::warn!(
                        "Job {} abandoned after its lease was lost",
                        envelope.id
                    );
                    return;
                }
            };

            settle(&queue, handler.as_ref(), &envelope, result).await;
        });
    }
}

/// Resolves once shutdown is requested or the sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Keep a claimed job's lease alive while it executes.
///
/// The task only finishes on its own once the lease is gone.
fn spawn_lease_renewal(queue: Arc<JobQueue>, id: String) -> tokio::task::JoinHandle<()> {
    let period = (queue.lease() / 2).max(Duration::from_millis(50));
    tokio::spawn(async move {
        let mut ticker = time::interval_at(time::Instant::now() + period, period);
        loop {
            ticker.tick().await;
            match queue.extend_lease(&id).await {
                Ok(true) => tracing::trace!("Lease extended for job {}", id),
                Ok(false) => {
                    tracing::warn!("Lease for job {} was lost", id);
                    break;
                }
                Err(e) => tracing::warn!("Failed to extend lease for job {}: {}", id, e),
            }
        }
    })
}

/// Report the outcome of one attempt back to the queue.
async fn settle(
    queue: &JobQueue,
    handler: &dyn JobHandler,
    envelope: &Envelope,
    result: Result<Option<serde_json::Value>, JobExecutionError>,
) {
    let id = envelope.id.as_str();
    let error = match result {
        Ok(_) => {
            match queue.ack(id).await {
                Ok(_) => tracing::info!("Job {} completed successfully", id),
                Err(e) => tracing::error!("Failed to mark job {} as completed: {}", id, e),
            }
            return;
        }
        Err(err) => err,
    };

    let retryable = error.is_retryable();
    let cause = AppError::from(error);
    let message = cause.message.clone();
    if !retryable {
        tracing::error!("Job {} failed permanently ({}): {}", id, cause.kind, message);
        match queue.fail(id, &message).await {
            Ok(_) => handler.on_exhausted(envelope, &cause).await,
            Err(e) => tracing::error!("Failed to mark job {} as failed: {}", id, e),
        }
        return;
    }

    match queue.nack(envelope, &message).await {
        Ok(NackOutcome::Retrying { attempt, delay }) => tracing::warn!(
            "Job {} attempt {} failed ({}), retrying in {:?}: {}",
            id,
            attempt,
            cause.kind,
            delay,
            message
        ),
        Ok(NackOutcome::Exhausted { attempts }) => {
            tracing::error!(
                "Job {} exhausted {} attempt(s): {}",
                id,
                attempts,
                message
            );
            let exhausted =
                AppError::with_source(ErrorKind::DeliveryExhausted, message, cause);
            handler.on_exhausted(envelope, &exhausted).await;
        }
        Ok(NackOutcome::LeaseLost) => {
            tracing::warn!("Job {} failed after its lease was lost: {}", id, message)
        }
        Err(e) => tracing::error!("Failed to report failure of job {}: {}", id, e),
    }
}

/// Requeue stalled jobs and mark the ones out of attempts as failed.
pub async fn recover_stalled_jobs(queue: &JobQueue, handler: &dyn JobHandler) -> AppResult<usize> {
    let exhausted = queue.recover_stalled().await?;
    for envelope in &exhausted {
        let reason = envelope
            .last_error
            .clone()
            .unwrap_or_else(|| "Delivery attempts exhausted".to_string());
        handler
            .on_exhausted(envelope, &AppError::delivery_exhausted(reason))
            .await;
    }
    Ok(exhausted.len())
}
