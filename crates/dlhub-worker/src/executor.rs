//! Job handler contract between the worker pool and job implementations.

use async_trait::async_trait;
use serde_json::Value;

use dlhub_core::error::AppError;
use dlhub_entity::Envelope;

/// Trait for job handler implementations
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// Get the job type this handler processes
    fn job_type(&self) -> &str;

    /// Run one delivery attempt of the job carried by `envelope`
    async fn execute(&self, envelope: &Envelope) -> Result<Option<Value>, JobExecutionError>;

    /// Called once the queue gives up on a job. `error` is
    /// `DeliveryExhausted` when attempts ran out (including a lease that
    /// expired on the final attempt), or the permanent failure itself.
    async fn on_exhausted(&self, envelope: &Envelope, error: &AppError);
}

/// Error from job execution
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// A unit of work failed; the job may be retried
    #[error("Unit of work failed: {0}")]
    UnitOfWork(String),

    /// Store, queue, or registry failure that outlasted local retries
    #[error("Infrastructure failure: {0}")]
    Infrastructure(#[from] AppError),

    /// Permanent failure, not retried
    #[error("Permanent job failure: {0}")]
    Permanent(String),
}

impl JobExecutionError {
    /// Whether another delivery could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }
}

impl From<JobExecutionError> for AppError {
    fn from(err: JobExecutionError) -> Self {
        match err {
            JobExecutionError::UnitOfWork(message) => AppError::unit_of_work(message),
            JobExecutionError::Infrastructure(inner) => inner,
            JobExecutionError::Permanent(message) => AppError::internal(message),
        }
    }
}
