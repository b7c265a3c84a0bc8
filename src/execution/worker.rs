//! A single queue consumer.

use super::WorkerError;
use crate::config::WorkerPoolConfig;
use crate::constants::events;
use crate::logging::{log_error, log_task_operation};
use crate::messaging::{AnalysisJob, JobPayload, TaskQueue};
use crate::models::{AnalysisResult, TaskFailure};
use crate::orchestration::{PipelineError, PipelineOrchestrator, RunContext};
use crate::storage::{TaskStore, TaskStoreError};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What happened to one dequeued job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    Completed,
    Failed,
    /// The task could not be claimed (already claimed, terminal or unknown)
    Skipped,
}

#[derive(Clone)]
pub struct Worker {
    worker_id: String,
    queue: TaskQueue,
    store: Arc<dyn TaskStore>,
    pipeline: Arc<PipelineOrchestrator>,
    config: WorkerPoolConfig,
}

impl Worker {
    pub fn new(
        worker_id: impl Into<String>,
        queue: TaskQueue,
        store: Arc<dyn TaskStore>,
        pipeline: Arc<PipelineOrchestrator>,
        config: WorkerPoolConfig,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            queue,
            store,
            pipeline,
            config,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Consume jobs until shutdown is signalled or the queue closes.
    ///
    /// Shutdown is only observed between jobs, so a pipeline that has started
    /// always runs to its terminal transition.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("🎯 Starting worker loop: {}", self.worker_id);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let job = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                job = self.queue.dequeue() => job,
            };

            let Some(job) = job else {
                debug!("Queue closed, worker {} exiting", self.worker_id);
                break;
            };

            let task_id = job.task_id;
            match AssertUnwindSafe(self.process(job)).catch_unwind().await {
                Ok(Ok(outcome)) => {
                    debug!(worker_id = %self.worker_id, task_id = %task_id, ?outcome, "Job processed");
                }
                Ok(Err(e)) => {
                    log_error(&self.worker_id, "process", &e.to_string(), Some(&task_id.to_string()));
                }
                Err(_) => {
                    log_error(
                        &self.worker_id,
                        "process",
                        "worker panicked outside of a stage",
                        Some(&task_id.to_string()),
                    );
                }
            }
        }

        info!("✅ Worker loop finished: {}", self.worker_id);
    }

    /// Claim, run and record one job
    pub async fn process(&self, job: AnalysisJob) -> Result<WorkerOutcome, WorkerError> {
        let task_id = job.task_id;

        match self.store.mark_running(task_id).await {
            Ok(()) => {}
            Err(e @ (TaskStoreError::InvalidTransition { .. } | TaskStoreError::NotFound(_))) => {
                warn!(
                    worker_id = %self.worker_id,
                    task_id = %task_id,
                    error = %e,
                    "Skipping job that could not be claimed"
                );
                return Ok(WorkerOutcome::Skipped);
            }
            Err(e) => return Err(e.into()),
        }

        log_task_operation(
            events::TASK_STARTED,
            Some(task_id),
            "running",
            Some(&self.worker_id),
        );

        match self.run_pipeline(&job).await {
            Ok(result) => {
                self.store.complete(task_id, result).await?;
                log_task_operation(events::TASK_COMPLETED, Some(task_id), "completed", None);
                Ok(WorkerOutcome::Completed)
            }
            Err(error) => {
                let details = error.to_string();
                self.store.fail(task_id, TaskFailure::from(error)).await?;
                log_task_operation(
                    events::TASK_FAILED,
                    Some(task_id),
                    "failed",
                    Some(&details),
                );
                Ok(WorkerOutcome::Failed)
            }
        }
    }

    /// Run the pipeline, retrying transient stage failures while the task
    /// stays `Running`. Document text is extracted once, before the first
    /// attempt.
    async fn run_pipeline(&self, job: &AnalysisJob) -> Result<AnalysisResult, PipelineError> {
        let ctx = RunContext {
            task_id: Some(job.task_id),
            source: &job.source,
        };

        let extracted: String;
        let text = match &job.payload {
            JobPayload::Text(text) => text.as_str(),
            JobPayload::Document(bytes) => {
                extracted = self.pipeline.extract_text(Arc::clone(bytes)).await?;
                extracted.as_str()
            }
        };

        let mut attempt = 0u32;

        loop {
            match self
                .pipeline
                .run_with_context(ctx, text, &job.query)
                .await
            {
                Err(error) if error.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff = self.config.retry_backoff(attempt);
                    log_task_operation(
                        events::TASK_RETRY_REQUESTED,
                        Some(job.task_id),
                        "running",
                        Some(&format!(
                            "attempt {attempt} of {} after {error}; backing off {}ms",
                            self.config.max_retries,
                            backoff.as_millis()
                        )),
                    );
                    tokio::time::sleep(backoff).await;
                }
                outcome => return outcome,
            }
        }
    }
}
