//! # Execution
//!
//! The worker pool that drains the task queue. Each worker claims a task
//! (Pending -> Running), runs the pipeline, and records the terminal outcome.
//! Workers share nothing but the queue, the store and the orchestrator.

pub mod worker;
pub mod worker_pool;

use crate::storage::TaskStoreError;
use thiserror::Error;

pub use worker::{Worker, WorkerOutcome};
pub use worker_pool::WorkerPool;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Task store error: {0}")]
    Store(#[from] TaskStoreError),

    #[error("Worker {worker_id} did not shut down cleanly: {reason}")]
    Join { worker_id: String, reason: String },
}
