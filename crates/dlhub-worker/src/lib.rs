//! Background job processing for DLHub.
//!
//! This crate provides:
//! - A durable job queue with at-least-once delivery, exponential backoff,
//!   claim leases, and retention (in-memory or Redis)
//! - A worker pool with bounded slots and a global dequeue rate limit
//! - The batch download handler that drives per-file progress through the
//!   status store and notifies subscribers
//! - A maintenance scheduler for stalled-job recovery and retention purges

pub mod executor;
pub mod jobs;
pub mod limiter;
pub mod queue;
pub mod runner;
pub mod scheduler;
pub mod webhook;

pub use executor::{JobExecutionError, JobHandler};
pub use jobs::{BatchDownloadHandler, SimulatedFetcher, UnitOfWork};
pub use limiter::FixedWindowLimiter;
pub use queue::{JobQueue, NackOutcome};
pub use runner::WorkerPool;
pub use scheduler::MaintenanceScheduler;
