//! # Finsight Configuration System
//!
//! Typed configuration for the analysis pipeline, the task queue, the worker
//! pool and the task store. Values are layered by [`ConfigManager`]:
//! built-in defaults, then `finsight.toml`, then `finsight.<env>.toml`, then
//! `FINSIGHT_<SECTION>__<KEY>` environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use finsight_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//!
//! let timeout = manager.config().pipeline.stage_timeout();
//! let workers = manager.config().workers.worker_count;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::system;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinsightConfig {
    pub pipeline: PipelineConfig,
    pub stages: StageSettings,
    pub document: DocumentConfig,
    pub queue: QueueConfig,
    pub workers: WorkerPoolConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on a single stage invocation
    pub stage_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_ms: system::DEFAULT_STAGE_TIMEOUT_MS,
        }
    }
}

impl PipelineConfig {
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_millis(self.stage_timeout_ms)
    }
}

/// Settings handed to every stage invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSettings {
    /// Distinct financial terms Verify needs to accept a document
    pub min_financial_terms: usize,
    /// Stages only look at this many leading characters of the text
    pub max_context_chars: usize,
    /// Substituted for blank queries at submission
    pub default_query: String,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            min_financial_terms: system::DEFAULT_MIN_FINANCIAL_TERMS,
            max_context_chars: system::DEFAULT_MAX_CONTEXT_CHARS,
            default_query: system::DEFAULT_QUERY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub max_bytes: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            max_bytes: system::DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Bounded queue capacity; a full queue rejects submissions
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: system::DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    pub worker_count: usize,
    /// Extra pipeline attempts for timeouts and unavailable upstreams
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Running tasks older than this are failed by the sweeper. Unset disables it.
    pub stale_task_timeout_seconds: Option<u64>,
    pub sweep_interval_seconds: u64,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: system::DEFAULT_WORKER_COUNT,
            max_retries: 0,
            retry_backoff_ms: 1000,
            stale_task_timeout_seconds: None,
            sweep_interval_seconds: 60,
        }
    }
}

impl WorkerPoolConfig {
    /// Backoff before retry number `attempt` (1-based), growing linearly
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }

    pub fn stale_task_timeout(&self) -> Option<Duration> {
        self.stale_task_timeout_seconds.map(Duration::from_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
        }
    }
}

impl FinsightConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.pipeline.stage_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "pipeline.stage_timeout_ms",
                "0",
                "stage timeout must be greater than 0",
            ));
        }

        if self.stages.min_financial_terms == 0 {
            return Err(ConfigurationError::invalid_value(
                "stages.min_financial_terms",
                "0",
                "at least one financial term must be required",
            ));
        }

        if self.stages.max_context_chars == 0 {
            return Err(ConfigurationError::invalid_value(
                "stages.max_context_chars",
                "0",
                "context window must be greater than 0",
            ));
        }

        if self.stages.default_query.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "stages.default_query",
                "stage settings",
            ));
        }

        if self.document.max_bytes < system::PDF_MAGIC.len() {
            return Err(ConfigurationError::invalid_value(
                "document.max_bytes",
                self.document.max_bytes.to_string(),
                "limit is smaller than a PDF header",
            ));
        }

        if self.queue.capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.capacity",
                "0",
                "queue capacity must be greater than 0",
            ));
        }

        if self.workers.worker_count == 0 {
            return Err(ConfigurationError::invalid_value(
                "workers.worker_count",
                "0",
                "worker pool needs at least one worker",
            ));
        }

        if self.workers.stale_task_timeout_seconds.is_some()
            && self.workers.sweep_interval_seconds == 0
        {
            return Err(ConfigurationError::invalid_value(
                "workers.sweep_interval_seconds",
                "0",
                "sweep interval must be greater than 0 when the stale task timeout is set",
            ));
        }

        if self.storage.backend == StorageBackend::Postgres {
            match self.database.url.as_deref() {
                Some(url) if !url.trim().is_empty() => {}
                _ => {
                    return Err(ConfigurationError::missing_required_field(
                        "database.url",
                        "postgres storage backend",
                    ))
                }
            }

            if self.database.max_connections == 0 {
                return Err(ConfigurationError::invalid_value(
                    "database.max_connections",
                    "0",
                    "pool size must be greater than 0",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = FinsightConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.stage_timeout(), Duration::from_secs(300));
        assert_eq!(config.queue.capacity, 100);
        assert_eq!(config.workers.worker_count, 4);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.workers.stale_task_timeout().is_none());
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let mut config = FinsightConfig::default();
        config.queue.capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_postgres_requires_url() {
        let mut config = FinsightConfig::default();
        config.storage.backend = StorageBackend::Postgres;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::MissingRequiredField { .. })
        ));

        config.database.url = Some("postgresql://localhost/finsight".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_backoff_is_linear() {
        let workers = WorkerPoolConfig {
            retry_backoff_ms: 250,
            ..Default::default()
        };
        assert_eq!(workers.retry_backoff(1), Duration::from_millis(250));
        assert_eq!(workers.retry_backoff(3), Duration::from_millis(750));
    }
}
