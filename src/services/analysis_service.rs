//! # Analysis Service
//!
//! Entry points for callers: inline analysis of text or documents, queued
//! submission with a task record, and task lookups.
//!
//! Queued documents only have their header and size checked at submission.
//! Text extraction happens in the worker, so a PDF without usable text is
//! recorded and then fails with [`DocumentError`] like any other pipeline
//! failure.

use crate::constants::{events, system::INLINE_SOURCE};
use crate::document::DocumentError;
use crate::logging::log_task_operation;
use crate::messaging::{AnalysisJob, JobPayload, QueueError, TaskQueue};
use crate::models::{AnalysisResult, AnalysisTask, DocumentRef, TaskId, TaskStats};
use crate::orchestration::{PipelineError, PipelineOrchestrator, RunContext};
use crate::storage::{TaskStore, TaskStoreError, TaskStoreResult};
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

/// Why an asynchronous submission was not accepted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Store(#[from] TaskStoreError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl SubmissionError {
    /// Backpressure rather than a fault; callers may retry later
    pub fn is_queue_full(&self) -> bool {
        matches!(self, Self::Queue(QueueError::QueueFull { .. }))
    }
}

/// Submission facade over the pipeline, the task store and the queue.
///
/// The synchronous paths run the pipeline inline and leave no task record.
/// The asynchronous paths reserve a queue slot, create a `Pending` record and
/// hand the job to the worker pool; the caller polls [`get_task`] for the
/// outcome.
///
/// [`get_task`]: AnalysisService::get_task
#[derive(Clone)]
pub struct AnalysisService {
    pipeline: Arc<PipelineOrchestrator>,
    store: Arc<dyn TaskStore>,
    queue: TaskQueue,
}

impl AnalysisService {
    pub fn new(
        pipeline: Arc<PipelineOrchestrator>,
        store: Arc<dyn TaskStore>,
        queue: TaskQueue,
    ) -> Self {
        Self {
            pipeline,
            store,
            queue,
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Run the pipeline inline and return its outcome
    pub async fn analyze_sync(
        &self,
        text: &str,
        query: &str,
    ) -> Result<AnalysisResult, PipelineError> {
        let query = self.effective_query(query);
        self.pipeline.run(text, query).await
    }

    /// Load a document and run the pipeline inline. Load failures surface as
    /// [`PipelineError::Document`].
    pub async fn analyze_document_sync<R: Read>(
        &self,
        source: &str,
        reader: R,
        query: &str,
    ) -> Result<AnalysisResult, PipelineError> {
        let document = self.pipeline.loader().read(source, reader)?;
        let text = self.pipeline.extract_text(document.bytes).await?;
        let query = self.effective_query(query);
        let ctx = RunContext {
            task_id: None,
            source,
        };
        self.pipeline
            .run_with_context(ctx, &text, query)
            .await
    }

    /// Record a task for `text` and queue it. Returns as soon as the job is
    /// queued.
    ///
    /// Empty text is accepted here; the worker fails the task with
    /// [`DocumentError::Empty`] before any stage runs.
    pub async fn analyze_async(&self, text: &str, query: &str) -> Result<TaskId, SubmissionError> {
        let payload = JobPayload::Text(text.to_string());
        self.submit(INLINE_SOURCE, payload, DocumentRef::inline(text), query)
            .await
    }

    /// Check a document's header and size, then record and queue it like
    /// [`analyze_async`]. Input that is not a PDF, or is over the size limit,
    /// is rejected without creating a task. Extraction runs in the worker, so
    /// a PDF with no usable text ends as a `Failed` task.
    ///
    /// [`analyze_async`]: AnalysisService::analyze_async
    pub async fn analyze_document_async<R: Read>(
        &self,
        source: &str,
        reader: R,
        query: &str,
    ) -> Result<TaskId, SubmissionError> {
        let document = self.pipeline.loader().read(source, reader)?;
        let payload = JobPayload::Document(document.bytes);
        self.submit(source, payload, document.reference, query)
            .await
    }

    pub async fn get_task(&self, task_id: TaskId) -> TaskStoreResult<AnalysisTask> {
        self.store.get(task_id).await
    }

    /// Newest first
    pub async fn recent(&self, limit: usize) -> TaskStoreResult<Vec<AnalysisTask>> {
        self.store.recent(limit).await
    }

    pub async fn stats(&self) -> TaskStoreResult<TaskStats> {
        self.store.stats().await
    }

    async fn submit(
        &self,
        source: &str,
        payload: JobPayload,
        document_ref: DocumentRef,
        query: &str,
    ) -> Result<TaskId, SubmissionError> {
        let query = self.effective_query(query);

        // The slot is taken before the record exists, so a full queue never
        // leaves an orphaned Pending task behind.
        let slot = self.queue.reserve()?;
        let task_id = self.store.create(query, document_ref).await?;
        slot.send(AnalysisJob::with_payload(task_id, source, payload, query));

        log_task_operation(
            events::TASK_ENQUEUED,
            Some(task_id),
            "pending",
            Some(source),
        );
        debug!(queue_depth = self.queue.depth(), "Submission accepted");

        Ok(task_id)
    }

    fn effective_query<'a>(&'a self, query: &'a str) -> &'a str {
        if query.trim().is_empty() {
            &self.pipeline.settings().default_query
        } else {
            query
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FinsightConfig;
    use crate::constants::system::DEFAULT_QUERY;
    use crate::stages::AnalysisStages;
    use crate::state_machine::TaskState;
    use crate::storage::InMemoryTaskStore;

    fn service(capacity: usize) -> (AnalysisService, Arc<InMemoryTaskStore>) {
        let config = FinsightConfig::default();
        let store = Arc::new(InMemoryTaskStore::new());
        let pipeline = Arc::new(PipelineOrchestrator::from_config(
            &config,
            AnalysisStages::builtin(),
        ));
        let service = AnalysisService::new(pipeline, store.clone(), TaskQueue::new(capacity));
        (service, store)
    }

    #[tokio::test]
    async fn test_sync_path_leaves_no_record() {
        let (service, store) = service(4);
        let result = service
            .analyze_sync("Revenue grew 20% YoY, Net Income $5M", "Analyze growth")
            .await
            .unwrap();

        assert!(result.metrics.contains("revenue_growth_pct"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_async_path_records_pending_task_with_default_query() {
        let (service, store) = service(4);
        let task_id = service
            .analyze_async("Revenue grew 20% YoY, Net Income $5M", "   ")
            .await
            .unwrap();

        let task = store.get(task_id).await.unwrap();
        assert_eq!(task.status(), TaskState::Pending);
        assert_eq!(task.query(), DEFAULT_QUERY);
        assert!(task.result().is_none());
        assert!(task.error().is_none());

        let job = service.queue().dequeue().await.unwrap();
        assert_eq!(job.task_id, task_id);
        assert_eq!(job.query, DEFAULT_QUERY);
    }

    #[tokio::test]
    async fn test_full_queue_creates_no_record() {
        let (service, store) = service(1);
        service.analyze_async("Revenue $1M", "q").await.unwrap();

        let err = service.analyze_async("Revenue $2M", "q").await.unwrap_err();
        assert!(err.is_queue_full());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_document_is_rejected_before_recording() {
        let (service, store) = service(4);
        let err = service
            .analyze_document_async("notes.txt", &b"plain text"[..], "q")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SubmissionError::Document(DocumentError::Unreadable(_))
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_document_submission_defers_extraction_to_worker() {
        let (service, store) = service(4);
        let bytes = b"%PDF-1.4\n%%EOF\n";
        let task_id = service
            .analyze_document_async("scan.pdf", &bytes[..], "q")
            .await
            .unwrap();

        let task = store.get(task_id).await.unwrap();
        assert_eq!(task.status(), TaskState::Pending);
        assert_eq!(task.document_ref().byte_len, bytes.len());

        let job = service.queue().dequeue().await.unwrap();
        assert_eq!(job.source, "scan.pdf");
        assert_eq!(job.payload, JobPayload::Document(Arc::from(&bytes[..])));
    }
}
