//! In-process task store.
//!
//! Each transition runs under the map's per-entry write lock, so the
//! check-and-set in [`AnalysisTask`] is atomic with respect to every other
//! caller touching the same task.
//!
//! ```rust
//! use finsight_core::models::DocumentRef;
//! use finsight_core::state_machine::TaskState;
//! use finsight_core::storage::{InMemoryTaskStore, TaskStore};
//!
//! # tokio_test::block_on(async {
//! let store = InMemoryTaskStore::new();
//! let id = store
//!     .create("Analyze growth", DocumentRef::inline("Revenue grew 20% YoY"))
//!     .await
//!     .unwrap();
//!
//! store.mark_running(id).await.unwrap();
//! // A second claim loses
//! assert!(store.mark_running(id).await.is_err());
//! assert_eq!(store.get(id).await.unwrap().status(), TaskState::Running);
//! # });
//! ```

use super::{TaskStore, TaskStoreError, TaskStoreResult};
use crate::constants::events;
use crate::logging::log_task_operation;
use crate::models::{AnalysisResult, AnalysisTask, DocumentRef, TaskFailure, TaskId, TaskStats};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: DashMap<TaskId, AnalysisTask>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn update<F>(&self, task_id: TaskId, apply: F) -> TaskStoreResult<()>
    where
        F: FnOnce(&mut AnalysisTask) -> crate::state_machine::StateMachineResult<()>,
    {
        let mut entry = self
            .tasks
            .get_mut(&task_id)
            .ok_or(TaskStoreError::NotFound(task_id))?;
        apply(entry.value_mut()).map_err(|e| TaskStoreError::transition(task_id, e))
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, query: &str, document_ref: DocumentRef) -> TaskStoreResult<TaskId> {
        let task_id = TaskId::new();
        let task = AnalysisTask::new(task_id, query, document_ref, Utc::now());
        self.tasks.insert(task_id, task);

        log_task_operation(events::TASK_CREATED, Some(task_id), "pending", None);
        Ok(task_id)
    }

    async fn mark_running(&self, task_id: TaskId) -> TaskStoreResult<()> {
        self.update(task_id, |task| task.start(Utc::now()))
    }

    async fn complete(&self, task_id: TaskId, result: AnalysisResult) -> TaskStoreResult<()> {
        self.update(task_id, |task| task.complete(result, Utc::now()))
    }

    async fn fail(&self, task_id: TaskId, failure: TaskFailure) -> TaskStoreResult<()> {
        self.update(task_id, |task| task.fail(failure, Utc::now()))
    }

    async fn get(&self, task_id: TaskId) -> TaskStoreResult<AnalysisTask> {
        self.tasks
            .get(&task_id)
            .map(|entry| entry.value().clone())
            .ok_or(TaskStoreError::NotFound(task_id))
    }

    async fn recent(&self, limit: usize) -> TaskStoreResult<Vec<AnalysisTask>> {
        let mut tasks: Vec<AnalysisTask> =
            self.tasks.iter().map(|entry| entry.value().clone()).collect();
        tasks.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        tasks.truncate(limit);
        Ok(tasks)
    }

    async fn stats(&self) -> TaskStoreResult<TaskStats> {
        let mut stats = TaskStats::default();
        for entry in self.tasks.iter() {
            stats.record(entry.value().status());
        }
        Ok(stats)
    }

    async fn abandon_stale(&self, older_than: Duration) -> TaskStoreResult<Vec<TaskId>> {
        let now = Utc::now();
        let mut abandoned = Vec::new();

        for mut entry in self.tasks.iter_mut() {
            let stale = entry
                .value()
                .running_for(now)
                .and_then(|elapsed| elapsed.to_std().ok())
                .is_some_and(|elapsed| elapsed > older_than);

            if stale && entry.value_mut().abandon(now).is_ok() {
                abandoned.push(*entry.key());
            }
        }

        Ok(abandoned)
    }
}
