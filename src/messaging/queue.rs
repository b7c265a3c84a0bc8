//! Bounded FIFO task queue on a tokio MPSC channel.
//!
//! Producers never block: a full queue is reported as
//! [`QueueError::QueueFull`]. Consumers share the single receiver, so each
//! job is delivered to exactly one worker.

use super::errors::QueueError;
use super::message::AnalysisJob;
use crate::config::QueueConfig;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError, OwnedPermit};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct TaskQueue {
    sender: mpsc::Sender<AnalysisJob>,
    receiver: Arc<Mutex<mpsc::Receiver<AnalysisJob>>>,
    capacity: usize,
}

/// A reserved place in the queue. Dropping it without sending frees the slot.
#[derive(Debug)]
pub struct QueueSlot {
    permit: OwnedPermit<AnalysisJob>,
}

impl QueueSlot {
    pub fn send(self, job: AnalysisJob) {
        self.permit.send(job);
    }
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            capacity,
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs waiting, including reserved slots not yet filled
    pub fn depth(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Enqueue without waiting
    pub fn try_enqueue(&self, job: AnalysisJob) -> Result<(), QueueError> {
        self.sender.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::QueueFull {
                capacity: self.capacity,
            },
            TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Reserve a slot up front so a caller can do other work before sending
    /// and still be guaranteed a place
    pub fn reserve(&self) -> Result<QueueSlot, QueueError> {
        self.sender
            .clone()
            .try_reserve_owned()
            .map(|permit| QueueSlot { permit })
            .map_err(|e| match e {
                TrySendError::Full(_) => QueueError::QueueFull {
                    capacity: self.capacity,
                },
                TrySendError::Closed(_) => QueueError::Closed,
            })
    }

    /// Wait for the next job. `None` once the queue is closed and drained.
    pub async fn dequeue(&self) -> Option<AnalysisJob> {
        self.receiver.lock().await.recv().await
    }

    /// Stop accepting jobs; already queued jobs can still be dequeued.
    ///
    /// Waits for any consumer blocked in [`dequeue`](Self::dequeue) to give up
    /// the receiver first.
    pub async fn close(&self) {
        self.receiver.lock().await.close();
    }
}
