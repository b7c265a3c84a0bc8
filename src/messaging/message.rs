//! Queue message for one accepted submission.

use crate::models::TaskId;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// What the worker analyzes
#[derive(Debug, Clone, PartialEq)]
pub enum JobPayload {
    /// Text submitted directly
    Text(String),
    /// PDF bytes that passed the format check; the worker extracts the text
    Document(Arc<[u8]>),
}

/// Work item consumed by exactly one worker
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisJob {
    pub task_id: TaskId,
    /// Document name for logs and the company-name fallback
    pub source: String,
    pub payload: JobPayload,
    pub query: String,
    pub enqueued_at: DateTime<Utc>,
}

impl AnalysisJob {
    pub fn new(
        task_id: TaskId,
        source: impl Into<String>,
        text: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self::with_payload(task_id, source, JobPayload::Text(text.into()), query)
    }

    pub fn document(
        task_id: TaskId,
        source: impl Into<String>,
        bytes: Arc<[u8]>,
        query: impl Into<String>,
    ) -> Self {
        Self::with_payload(task_id, source, JobPayload::Document(bytes), query)
    }

    pub fn with_payload(
        task_id: TaskId,
        source: impl Into<String>,
        payload: JobPayload,
        query: impl Into<String>,
    ) -> Self {
        Self {
            task_id,
            source: source.into(),
            payload,
            query: query.into(),
            enqueued_at: Utc::now(),
        }
    }

    /// Time spent waiting in the queue as of `now`
    pub fn queued_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.enqueued_at
    }
}
