//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! optional TOML files plus `DLHUB__`-prefixed environment variables. Each
//! sub-module represents a logical configuration section, and every field
//! has a default so an empty configuration is valid.

pub mod backend;
pub mod logging;
pub mod queue;
pub mod registry;
pub mod simulation;
pub mod status;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::backend::{BackendConfig, RedisConfig};
pub use self::logging::LoggingConfig;
pub use self::queue::QueueConfig;
pub use self::registry::RegistryConfig;
pub use self::simulation::SimulationConfig;
pub use self::status::StatusConfig;
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage backend selection shared by queue, store, and registry.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Queue retry, backoff, and retention settings.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Worker pool settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Simulated unit-of-work bounds.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Status store settings.
    #[serde(default)]
    pub status: StatusConfig,
    /// Connection registry settings.
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files and the environment.
    ///
    /// Merges `config/default.toml`, the `config/{env}.toml` overlay, and
    /// environment variables such as `DLHUB__WORKER__CONCURRENCY=5`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("DLHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the worker cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.worker.concurrency == 0 {
            return Err(AppError::configuration("worker.concurrency must be at least 1"));
        }
        if self.worker.rate_limit_max == 0 {
            return Err(AppError::configuration("worker.rate_limit_max must be at least 1"));
        }
        if self.queue.max_attempts == 0 {
            return Err(AppError::configuration("queue.max_attempts must be at least 1"));
        }
        if self.simulation.delay_min_ms > self.simulation.delay_max_ms {
            return Err(AppError::configuration(
                "simulation.delay_min_ms must not exceed simulation.delay_max_ms",
            ));
        }
        if self.simulation.size_min_bytes > self.simulation.size_max_bytes {
            return Err(AppError::configuration(
                "simulation.size_min_bytes must not exceed simulation.size_max_bytes",
            ));
        }
        if !(0.0..=1.0).contains(&self.simulation.failure_rate) {
            return Err(AppError::configuration(
                "simulation.failure_rate must be within 0.0..=1.0",
            ));
        }
        match self.backend.provider.as_str() {
            "memory" | "redis" => Ok(()),
            other => Err(AppError::configuration(format!(
                "Unknown backend provider: '{other}'. Supported: memory, redis"
            ))),
        }
    }
}
