//! # Task Store
//!
//! Durable record of analysis tasks keyed by [`TaskId`]. Every status change
//! is a conditional transition checked against the state machine: a rejected
//! transition leaves the record untouched and reports
//! [`TaskStoreError::InvalidTransition`]. Readers never see a partially
//! applied transition.
//!
//! Two backends ship with the crate: [`InMemoryTaskStore`] for a single
//! process and, behind the `postgres` feature, `PgTaskStore`.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use crate::models::{AnalysisResult, AnalysisTask, DocumentRef, TaskFailure, TaskId, TaskStats};
use crate::state_machine::{StateMachineError, TaskEvent, TaskState};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use memory::InMemoryTaskStore;
#[cfg(feature = "postgres")]
pub use postgres::PgTaskStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskStoreError {
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Invalid transition for task {task_id}: cannot apply '{event}' in state '{from}'")]
    InvalidTransition {
        task_id: TaskId,
        from: TaskState,
        event: TaskEvent,
    },

    #[error("Database error: {0}")]
    Database(String),

    /// A persisted record violates the task invariant
    #[error("Corrupt task record: {0}")]
    Corrupt(String),
}

impl TaskStoreError {
    pub fn transition(task_id: TaskId, error: StateMachineError) -> Self {
        match error {
            StateMachineError::InvalidTransition { from, event } => Self::InvalidTransition {
                task_id,
                from,
                event,
            },
        }
    }
}

pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create a new `Pending` task and return its fresh id
    async fn create(&self, query: &str, document_ref: DocumentRef) -> TaskStoreResult<TaskId>;

    /// Pending -> Running. Exactly one concurrent caller succeeds.
    async fn mark_running(&self, task_id: TaskId) -> TaskStoreResult<()>;

    /// Running -> Completed with the result attached
    async fn complete(&self, task_id: TaskId, result: AnalysisResult) -> TaskStoreResult<()>;

    /// Running -> Failed with the failure attached
    async fn fail(&self, task_id: TaskId, failure: TaskFailure) -> TaskStoreResult<()>;

    async fn get(&self, task_id: TaskId) -> TaskStoreResult<AnalysisTask>;

    /// Most recently created tasks first
    async fn recent(&self, limit: usize) -> TaskStoreResult<Vec<AnalysisTask>>;

    async fn stats(&self) -> TaskStoreResult<TaskStats>;

    /// Fail every task that has been `Running` for longer than `older_than`.
    /// Returns the ids that were abandoned.
    async fn abandon_stale(&self, older_than: Duration) -> TaskStoreResult<Vec<TaskId>>;
}
