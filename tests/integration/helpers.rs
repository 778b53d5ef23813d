//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use dlhub_core::config::AppConfig;
use dlhub_core::error::AppError;
use dlhub_core::result::AppResult;
use dlhub_core::retry::WriteRetry;
use dlhub_core::traits::{QueueStats, StatusStore};
use dlhub_entity::{JobStatus, StatusPatch};
use dlhub_realtime::{BroadcastNotifier, MemoryConnectionRegistry, ProgressFanout};
use dlhub_service::{DownloadService, SubmitRequest, SubscriptionService};
use dlhub_store::memory::MemoryStatusStore;
use dlhub_worker::queue::MemoryQueueBackend;
use dlhub_worker::{BatchDownloadHandler, JobHandler, JobQueue, UnitOfWork, WorkerPool};

/// Configuration tuned for fast tests.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.queue.backoff_base_ms = 50;
    config.worker.poll_interval_ms = 5;
    config.worker.store_retry_delay_ms = 1;
    config
}

/// Status store that keeps every snapshot it writes and can simulate
/// a short outage.
#[derive(Debug)]
pub struct RecordingStore {
    inner: MemoryStatusStore,
    history: Mutex<Vec<JobStatus>>,
    failing_writes: AtomicU32,
}

impl RecordingStore {
    pub fn new(inner: MemoryStatusStore) -> Self {
        Self {
            inner,
            history: Mutex::new(Vec::new()),
            failing_writes: AtomicU32::new(0),
        }
    }

    /// Make the next `count` writes fail with a transient store error.
    pub fn fail_next_writes(&self, count: u32) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Every snapshot written for `job_id`, oldest first.
    pub fn history(&self, job_id: &str) -> Vec<JobStatus> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.job_id == job_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl StatusStore for RecordingStore {
    async fn upsert(&self, job_id: &str, patch: StatusPatch) -> AppResult<JobStatus> {
        let outage = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if outage {
            return Err(AppError::store("simulated connection reset"));
        }
        let record = self.inner.upsert(job_id, patch).await?;
        self.history.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn get(&self, job_id: &str) -> AppResult<Option<JobStatus>> {
        self.inner.get(job_id).await
    }

    async fn list_all(&self) -> AppResult<Vec<JobStatus>> {
        self.inner.list_all().await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}

/// Unit of work with a fixed delay and scripted failures.
#[derive(Debug)]
pub struct TestFetcher {
    delay: Duration,
    failures: Mutex<HashMap<i64, u32>>,
    calls: Mutex<Vec<(String, i64)>>,
}

impl TestFetcher {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Make `file_id` fail its next `times` fetches.
    pub fn fail(&self, file_id: i64, times: u32) {
        self.failures.lock().unwrap().insert(file_id, times);
    }

    /// File ids fetched for `job_id`, in call order.
    pub fn calls(&self, job_id: &str) -> Vec<i64> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(job, _)| job == job_id)
            .map(|(_, file_id)| *file_id)
            .collect()
    }

    fn next_outcome(&self, job_id: &str, file_id: i64) -> Result<u64, String> {
        self.calls
            .lock()
            .unwrap()
            .push((job_id.to_string(), file_id));
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(&file_id) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Err(format!("checksum mismatch on file {file_id}"))
            }
            _ => Ok(4096 + file_id.unsigned_abs()),
        }
    }
}

#[async_trait]
impl UnitOfWork for TestFetcher {
    async fn fetch(&self, job_id: &str, file_id: i64) -> Result<u64, String> {
        tokio::time::sleep(self.delay).await;
        self.next_outcome(job_id, file_id)
    }
}

/// Full in-memory deployment: store, registry, queue, handler, services.
pub struct Harness {
    pub config: AppConfig,
    pub store: Arc<RecordingStore>,
    pub registry: Arc<MemoryConnectionRegistry>,
    pub notifier: Arc<BroadcastNotifier>,
    pub queue: Arc<JobQueue>,
    pub fetcher: Arc<TestFetcher>,
    pub handler: Arc<BatchDownloadHandler>,
    pub downloads: DownloadService,
    pub subscriptions: SubscriptionService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(RecordingStore::new(MemoryStatusStore::new(&config.status)));
        Self::with_store(config, store)
    }

    pub fn with_store(config: AppConfig, store: Arc<RecordingStore>) -> Self {
        let registry = Arc::new(MemoryConnectionRegistry::new(&config.registry));
        let notifier = Arc::new(BroadcastNotifier::new(1024));
        let queue = Arc::new(JobQueue::new(
            Arc::new(MemoryQueueBackend::new()),
            &config.queue,
        ));
        let fetcher = Arc::new(TestFetcher::new(Duration::from_millis(20)));

        let fanout = ProgressFanout::new(registry.clone(), notifier.clone());
        let handler = Arc::new(BatchDownloadHandler::new(
            store.clone(),
            fanout,
            fetcher.clone(),
            &config,
        ));

        let downloads = DownloadService::new(store.clone(), queue.clone())
            .with_write_retry(WriteRetry::from_config(&config.worker));
        let subscriptions = SubscriptionService::new(registry.clone());

        Self {
            config,
            store,
            registry,
            notifier,
            queue,
            fetcher,
            handler,
            downloads,
            subscriptions,
        }
    }

    /// Submit a batch and return its job id.
    pub async fn submit(&self, file_ids: Vec<i64>) -> String {
        self.downloads
            .submit(SubmitRequest::new(file_ids))
            .await
            .unwrap()
            .job_id
    }

    /// Start a worker pool on this harness.
    pub fn start_pool(&self, worker_id: &str) -> RunningPool {
        let handler: Arc<dyn JobHandler> = self.handler.clone();
        let pool = WorkerPool::new(
            self.queue.clone(),
            handler,
            self.config.worker.clone(),
            worker_id.to_string(),
        );
        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { pool.run(rx).await });
        RunningPool { shutdown, handle }
    }

    /// Poll until the job reaches a terminal stage.
    pub async fn wait_for_terminal(&self, job_id: &str) -> JobStatus {
        for _ in 0..20_000 {
            if let Some(record) = self.store.get(job_id).await.unwrap() {
                if record.is_terminal() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {job_id} never reached a terminal stage");
    }

    /// Poll until the queue statistics satisfy `done`.
    pub async fn wait_for_queue(&self, done: impl Fn(&QueueStats) -> bool) -> QueueStats {
        for _ in 0..20_000 {
            let stats = self.queue.stats().await.unwrap();
            if done(&stats) {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("queue never reached the expected state");
    }
}

/// A worker pool running on a background task.
pub struct RunningPool {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RunningPool {
    /// Signal shutdown and wait for the pool to stop.
    pub async fn stop(self) {
        self.shutdown.send(true).unwrap();
        self.handle.await.unwrap();
    }
}
