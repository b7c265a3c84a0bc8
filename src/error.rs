//! Crate-level error type for callers that want one error to handle.
//!
//! Each component keeps its own error enum; everything converts into
//! [`FinsightError`] with `?`.

use crate::config::ConfigurationError;
use crate::document::DocumentError;
use crate::execution::WorkerError;
use crate::messaging::QueueError;
use crate::orchestration::PipelineError;
use crate::services::SubmissionError;
use crate::state_machine::StateMachineError;
use crate::storage::TaskStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinsightError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Task store error: {0}")]
    Store(#[from] TaskStoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Submission rejected: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("State transition error: {0}")]
    StateTransition(#[from] StateMachineError),
}

pub type Result<T> = std::result::Result<T, FinsightError>;
