//! # Messaging Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue is at capacity; the submission is rejected, never dropped
    #[error("Queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Every receiver is gone; the worker pool has shut down
    #[error("Queue is closed")]
    Closed,
}
