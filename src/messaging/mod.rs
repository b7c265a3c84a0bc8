//! # Messaging Module
//!
//! The bounded in-process queue that carries submitted tasks from the
//! submission facade to the worker pool.

pub mod errors;
pub mod message;
pub mod queue;

pub use errors::QueueError;
pub use message::{AnalysisJob, JobPayload};
pub use queue::{QueueSlot, TaskQueue};
