//! # Analysis System Bootstrap
//!
//! Wires configuration into a running system: the task store for the
//! configured backend, the bounded queue, the pipeline, the worker pool and
//! the submission facade on top of them.

use super::PipelineOrchestrator;
use crate::config::{ConfigManager, FinsightConfig, StorageBackend};
use crate::error::Result;
use crate::execution::WorkerPool;
use crate::messaging::TaskQueue;
use crate::services::AnalysisService;
use crate::stages::AnalysisStages;
use crate::storage::{InMemoryTaskStore, TaskStore};
use std::sync::Arc;
use tracing::info;

/// Snapshot of a running system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemStatus {
    pub backend: StorageBackend,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub queue_depth: usize,
    pub accepting_submissions: bool,
}

/// A running analysis system. Call [`shutdown`](AnalysisSystem::shutdown)
/// to stop the workers.
pub struct AnalysisSystem {
    service: AnalysisService,
    worker_pool: WorkerPool,
    backend: StorageBackend,
}

impl AnalysisSystem {
    /// Load configuration for the detected environment and start the system
    pub async fn bootstrap_from_environment() -> Result<Self> {
        let config_manager = ConfigManager::load()?;
        info!(
            "✅ BOOTSTRAP: Configuration loaded for environment: {}",
            config_manager.environment()
        );
        Self::bootstrap(config_manager.config()).await
    }

    /// Start with the built-in stages
    pub async fn bootstrap(config: &FinsightConfig) -> Result<Self> {
        Self::with_stages(config, AnalysisStages::builtin()).await
    }

    /// Start with a custom set of stage implementations
    pub async fn with_stages(config: &FinsightConfig, stages: AnalysisStages) -> Result<Self> {
        info!("🚀 BOOTSTRAP: Starting analysis system");
        config.validate()?;

        let store = build_store(config).await?;
        let queue = TaskQueue::from_config(&config.queue);
        let pipeline = Arc::new(PipelineOrchestrator::from_config(config, stages));

        let worker_pool = WorkerPool::start(
            &config.workers,
            queue.clone(),
            store.clone(),
            pipeline.clone(),
        );

        let service = AnalysisService::new(pipeline, store, queue);

        info!(
            "✅ BOOTSTRAP: Analysis system ready ({:?} store, {} workers, queue capacity {})",
            config.storage.backend,
            worker_pool.worker_count(),
            config.queue.capacity
        );

        Ok(Self {
            service,
            worker_pool,
            backend: config.storage.backend,
        })
    }

    pub fn service(&self) -> &AnalysisService {
        &self.service
    }

    pub fn status(&self) -> SystemStatus {
        let queue = self.service.queue();
        SystemStatus {
            backend: self.backend,
            worker_count: self.worker_pool.worker_count(),
            queue_capacity: queue.capacity(),
            queue_depth: queue.depth(),
            accepting_submissions: !queue.is_closed(),
        }
    }

    /// Stop accepting submissions and wait for in-flight tasks to finish
    pub async fn shutdown(self) -> Result<()> {
        self.worker_pool.shutdown().await?;
        info!("🛑 BOOTSTRAP: Analysis system stopped");
        Ok(())
    }
}

async fn build_store(config: &FinsightConfig) -> Result<Arc<dyn TaskStore>> {
    match config.storage.backend {
        StorageBackend::Memory => Ok(Arc::new(InMemoryTaskStore::new())),
        #[cfg(feature = "postgres")]
        StorageBackend::Postgres => {
            let store = crate::storage::PgTaskStore::connect(&config.database).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        StorageBackend::Postgres => Err(crate::config::ConfigurationError::invalid_value(
            "storage.backend",
            "postgres",
            "built without the `postgres` feature",
        )
        .into()),
    }
}
