//! Backend wiring shared by every subcommand.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast::error::RecvError, watch};
use uuid::Uuid;

use dlhub_core::config::AppConfig;
use dlhub_core::error::AppError;
use dlhub_core::result::AppResult;
use dlhub_core::retry::WriteRetry;
use dlhub_core::traits::{ConnectionRegistry, StatusStore};
use dlhub_realtime::{BroadcastNotifier, MemoryConnectionRegistry, ProgressFanout};
use dlhub_service::{DownloadService, SubmitRequest, SubscriptionService};
use dlhub_store::StatusStoreManager;
use dlhub_store::redis::RedisClient;
use dlhub_worker::webhook::CompletionWebhook;
use dlhub_worker::{
    BatchDownloadHandler, JobHandler, JobQueue, MaintenanceScheduler, SimulatedFetcher,
    WorkerPool,
};

/// Subscriber id the CLI registers for jobs it seeds itself.
const CLI_SUBSCRIBER: &str = "cli";

/// Connected backends and the services built on them.
pub struct App {
    config: AppConfig,
    redis: Option<RedisClient>,
    store: Arc<dyn StatusStore>,
    registry: Arc<dyn ConnectionRegistry>,
    memory_registry: Option<Arc<MemoryConnectionRegistry>>,
    broadcast: Arc<BroadcastNotifier>,
    queue: Arc<JobQueue>,
    pub downloads: DownloadService,
    pub subscriptions: SubscriptionService,
}

impl App {
    /// Connect the configured backends.
    pub async fn build(config: AppConfig) -> AppResult<Self> {
        let redis = match config.backend.provider.as_str() {
            "redis" => {
                tracing::info!("Connecting to Redis...");
                Some(RedisClient::connect(&config.backend.redis).await?)
            }
            _ => None,
        };

        let store: Arc<dyn StatusStore> =
            Arc::new(StatusStoreManager::new(&config, redis.as_ref())?);

        let memory_registry = (config.backend.provider == "memory")
            .then(|| Arc::new(MemoryConnectionRegistry::new(&config.registry)));
        let registry: Arc<dyn ConnectionRegistry> = match &memory_registry {
            Some(registry) => registry.clone(),
            None => dlhub_realtime::registry::from_config(&config, redis.as_ref())?,
        };

        let queue = Arc::new(JobQueue::from_config(&config, redis.as_ref())?);
        let broadcast = Arc::new(BroadcastNotifier::new(config.registry.notify_buffer));

        let downloads = DownloadService::new(Arc::clone(&store), Arc::clone(&queue))
            .with_write_retry(WriteRetry::from_config(&config.worker));
        let subscriptions = SubscriptionService::new(Arc::clone(&registry));

        Ok(Self {
            config,
            redis,
            store,
            registry,
            memory_registry,
            broadcast,
            queue,
            downloads,
            subscriptions,
        })
    }

    /// Whether state lives only in this process.
    pub fn is_ephemeral(&self) -> bool {
        self.redis.is_none()
    }

    /// Run the worker pool until a shutdown signal arrives, or until the
    /// queue drains when `exit_when_idle` is set.
    pub async fn run_worker(
        &self,
        worker_id: Option<String>,
        seed: &[Vec<i64>],
        exit_when_idle: bool,
    ) -> AppResult<()> {
        tracing::info!("Starting DLHub worker v{}", env!("CARGO_PKG_VERSION"));

        let notifier =
            dlhub_realtime::notifier::from_config(&self.config, &self.broadcast, self.redis.as_ref())?;
        let fanout = ProgressFanout::new(Arc::clone(&self.registry), notifier);
        let fetcher = Arc::new(SimulatedFetcher::new(self.config.simulation.clone()));
        let handler: Arc<dyn JobHandler> = Arc::new(
            BatchDownloadHandler::new(Arc::clone(&self.store), fanout, fetcher, &self.config)
                .with_webhook(CompletionWebhook::new(Duration::from_secs(10))?),
        );

        let printer = self.is_ephemeral().then(|| self.spawn_progress_printer());
        for file_ids in seed {
            let response = self
                .downloads
                .submit(SubmitRequest::new(file_ids.clone()))
                .await?;
            self.subscriptions
                .subscribe(&response.job_id, CLI_SUBSCRIBER)
                .await?;
            println!("{}", serde_json::to_string(&response)?);
        }

        let mut scheduler =
            MaintenanceScheduler::new(Arc::clone(&self.queue), Arc::clone(&handler)).await?;
        if let Some(registry) = &self.memory_registry {
            scheduler = scheduler.with_registry(Arc::clone(registry));
        }
        scheduler
            .register_default_tasks(Duration::from_secs(
                self.config.worker.stalled_check_interval_seconds,
            ))
            .await?;
        scheduler.start().await?;

        let worker_id = worker_id.unwrap_or_else(|| format!("worker-{}", Uuid::new_v4()));
        let pool = WorkerPool::new(
            Arc::clone(&self.queue),
            handler,
            self.config.worker.clone(),
            worker_id,
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pool_task = tokio::spawn(async move { pool.run(shutdown_rx).await });

        if exit_when_idle {
            tokio::select! {
                _ = shutdown_signal() => tracing::info!("Shutdown signal received"),
                _ = self.wait_until_idle() => tracing::info!("Queue drained"),
            }
        } else {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received");
        }

        let _ = shutdown_tx.send(true);
        pool_task
            .await
            .map_err(|e| AppError::internal(format!("Worker task failed: {e}")))?;

        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!("Scheduler shutdown failed: {}", e);
        }
        if let Some(printer) = printer {
            printer.abort();
        }

        tracing::info!("DLHub worker stopped");
        Ok(())
    }

    /// Print progress events from the in-process notifier as JSON lines.
    fn spawn_progress_printer(&self) -> tokio::task::JoinHandle<()> {
        let mut deliveries = self.broadcast.subscribe();
        tokio::spawn(async move {
            loop {
                match deliveries.recv().await {
                    Ok(delivery) => match serde_json::to_string(&delivery.event) {
                        Ok(line) => println!("{line}"),
                        Err(e) => tracing::warn!("Unprintable progress event: {}", e),
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Progress printer skipped {} event(s)", skipped)
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    async fn wait_until_idle(&self) {
        loop {
            match self.queue.stats().await {
                Ok(stats) if stats.waiting + stats.delayed + stats.active == 0 => return,
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to read queue stats: {}", e),
            }
            tokio::time::sleep(self.config.worker.poll_interval()).await;
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
