//! Worker Pool Management
//!
//! Spawns `worker_count` [`Worker`] loops on the tokio runtime plus, when a
//! stale-task timeout is configured, a sweeper that fails tasks whose worker
//! never reported back.
//!
//! # Examples
//!
//! ```rust,no_run
//! use finsight_core::config::FinsightConfig;
//! use finsight_core::execution::WorkerPool;
//! use finsight_core::messaging::TaskQueue;
//! use finsight_core::orchestration::PipelineOrchestrator;
//! use finsight_core::stages::AnalysisStages;
//! use finsight_core::storage::InMemoryTaskStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = FinsightConfig::default();
//!     let queue = TaskQueue::from_config(&config.queue);
//!     let store = Arc::new(InMemoryTaskStore::new());
//!     let pipeline = Arc::new(PipelineOrchestrator::from_config(&config, AnalysisStages::builtin()));
//!
//!     let pool = WorkerPool::start(&config.workers, queue, store, pipeline);
//!     pool.shutdown().await.unwrap();
//! }
//! ```

use super::worker::Worker;
use super::WorkerError;
use crate::config::WorkerPoolConfig;
use crate::constants::events;
use crate::logging::{log_error, log_task_operation};
use crate::messaging::TaskQueue;
use crate::orchestration::PipelineOrchestrator;
use crate::storage::TaskStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct WorkerPool {
    queue: TaskQueue,
    shutdown_tx: watch::Sender<bool>,
    worker_handles: Vec<(String, JoinHandle<()>)>,
    sweeper_handle: Option<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn the workers; must be called from within a tokio runtime
    pub fn start(
        config: &WorkerPoolConfig,
        queue: TaskQueue,
        store: Arc<dyn TaskStore>,
        pipeline: Arc<PipelineOrchestrator>,
    ) -> Self {
        info!(
            "🔄 Starting WorkerPool with {} workers (queue capacity {})",
            config.worker_count,
            queue.capacity()
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker_handles = (0..config.worker_count)
            .map(|i| {
                let worker = Worker::new(
                    format!("worker_{i}"),
                    queue.clone(),
                    store.clone(),
                    pipeline.clone(),
                    config.clone(),
                );
                let worker_id = worker.worker_id().to_string();
                let handle = tokio::spawn(worker.run(shutdown_rx.clone()));
                (worker_id, handle)
            })
            .collect();

        let sweeper_handle = config.stale_task_timeout().map(|timeout| {
            tokio::spawn(sweep_stale_tasks(
                store.clone(),
                timeout,
                config.sweep_interval(),
                shutdown_rx.clone(),
            ))
        });

        info!(
            "✅ WorkerPool started with {} workers (stale task sweeper: {})",
            config.worker_count,
            if sweeper_handle.is_some() { "on" } else { "off" }
        );

        Self {
            queue,
            shutdown_tx,
            worker_handles,
            sweeper_handle,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_handles.len()
    }

    /// Stop accepting jobs and wait for every worker to finish the job it is
    /// running. Jobs still queued stay `Pending` in the store.
    pub async fn shutdown(self) -> Result<(), WorkerError> {
        info!("🛑 Shutting down WorkerPool");

        // Signal first: an idle worker holds the receiver lock while waiting
        // for a job and only lets go once it sees the signal.
        // Receivers may already be gone if every worker exited.
        let _ = self.shutdown_tx.send(true);
        self.queue.close().await;

        let mut first_error = None;
        for (worker_id, handle) in self.worker_handles {
            if let Err(e) = handle.await {
                log_error("worker_pool", "shutdown", &e.to_string(), Some(&worker_id));
                first_error.get_or_insert(WorkerError::Join {
                    worker_id,
                    reason: e.to_string(),
                });
            }
        }

        if let Some(handle) = self.sweeper_handle {
            if let Err(e) = handle.await {
                warn!("Stale task sweeper did not stop cleanly: {}", e);
            }
        }

        let remaining = self.queue.depth();
        if remaining > 0 {
            warn!("WorkerPool stopped with {} jobs still queued", remaining);
        }

        info!("✅ WorkerPool shut down");
        first_error.map_or(Ok(()), Err)
    }
}

async fn sweep_stale_tasks(
    store: Arc<dyn TaskStore>,
    timeout: Duration,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        "🧹 Stale task sweeper running every {:?} (timeout {:?})",
        interval, timeout
    );
    // interval() panics on a zero period
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        match store.abandon_stale(timeout).await {
            Ok(abandoned) => {
                for task_id in abandoned {
                    log_task_operation(
                        events::TASK_ABANDONED,
                        Some(task_id),
                        "failed",
                        Some(&format!("running longer than {}s", timeout.as_secs())),
                    );
                }
            }
            Err(e) => log_error("stale_task_sweeper", "abandon_stale", &e.to_string(), None),
        }
    }
}
