//! # Analysis Task Model
//!
//! The durable record for one submitted (document, query) pair.
//!
//! The record enforces its own invariant: while `Pending` or `Running` both
//! `result` and `error` are absent, and once terminal exactly one of them is
//! present. Every mutation goes through the transition table in
//! [`crate::state_machine`] and is validated before anything is written, so a
//! rejected transition leaves the record untouched.

use crate::orchestration::PipelineError;
use crate::state_machine::{StateMachineResult, TaskEvent, TaskState, TaskStateMachine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::analysis::AnalysisResult;

/// Opaque, never-reused task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Reference to the analysed document: where it came from and a digest of its
/// bytes. The bytes themselves are never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub source: String,
    pub sha256: String,
    pub byte_len: usize,
}

impl DocumentRef {
    pub fn from_bytes(source: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            source: source.into(),
            sha256: format!("{:x}", Sha256::digest(bytes)),
            byte_len: bytes.len(),
        }
    }

    /// Reference for text submitted directly rather than as a file
    pub fn inline(text: &str) -> Self {
        Self::from_bytes(crate::constants::system::INLINE_SOURCE, text.as_bytes())
    }
}

/// Why a task ended in `Failed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskFailure {
    /// The pipeline returned an error
    Pipeline { error: PipelineError },
    /// No worker reported back within the stale-task timeout
    Abandoned { running_for_secs: u64 },
}

impl TaskFailure {
    pub fn pipeline_error(&self) -> Option<&PipelineError> {
        match self {
            Self::Pipeline { error } => Some(error),
            Self::Abandoned { .. } => None,
        }
    }
}

impl From<PipelineError> for TaskFailure {
    fn from(error: PipelineError) -> Self {
        Self::Pipeline { error }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipeline { error } => write!(f, "{error}"),
            Self::Abandoned { running_for_secs } => write!(
                f,
                "Worker did not report back after {running_for_secs}s; task abandoned"
            ),
        }
    }
}

/// One analysis task as persisted and returned by `get(task_id)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TaskRecord")]
pub struct AnalysisTask {
    id: TaskId,
    status: TaskState,
    query: String,
    document_ref: DocumentRef,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    processing_time_ms: Option<u64>,
    result: Option<AnalysisResult>,
    error: Option<TaskFailure>,
}

impl AnalysisTask {
    /// New task in `Pending`
    pub fn new(
        id: TaskId,
        query: impl Into<String>,
        document_ref: DocumentRef,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            status: TaskState::Pending,
            query: query.into(),
            document_ref,
            created_at,
            started_at: None,
            completed_at: None,
            processing_time_ms: None,
            result: None,
            error: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn status(&self) -> TaskState {
        self.status
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn document_ref(&self) -> &DocumentRef {
        &self.document_ref
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn processing_time_ms(&self) -> Option<u64> {
        self.processing_time_ms
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&TaskFailure> {
        self.error.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Pending -> Running
    pub fn start(&mut self, at: DateTime<Utc>) -> StateMachineResult<()> {
        self.status = TaskStateMachine::determine_target_state(self.status, TaskEvent::Start)?;
        self.started_at = Some(at);
        Ok(())
    }

    /// Running -> Completed, attaching the result
    pub fn complete(&mut self, result: AnalysisResult, at: DateTime<Utc>) -> StateMachineResult<()> {
        self.finish(TaskEvent::Complete, at)?;
        self.result = Some(result);
        Ok(())
    }

    /// Running -> Failed, attaching the failure
    pub fn fail(&mut self, failure: TaskFailure, at: DateTime<Utc>) -> StateMachineResult<()> {
        self.finish(TaskEvent::Fail, at)?;
        self.error = Some(failure);
        Ok(())
    }

    /// Running -> Failed because the worker never reported back
    pub fn abandon(&mut self, at: DateTime<Utc>) -> StateMachineResult<()> {
        self.finish(TaskEvent::Abandon, at)?;
        let running_for_secs = self
            .started_at
            .map(|started| (at - started).num_seconds().max(0) as u64)
            .unwrap_or_default();
        self.error = Some(TaskFailure::Abandoned { running_for_secs });
        Ok(())
    }

    /// How long the task has been `Running` at `now`, if it is
    pub fn running_for(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        match (self.status, self.started_at) {
            (TaskState::Running, Some(started)) => Some(now - started),
            _ => None,
        }
    }

    fn finish(&mut self, event: TaskEvent, at: DateTime<Utc>) -> StateMachineResult<()> {
        self.status = TaskStateMachine::determine_target_state(self.status, event)?;
        self.completed_at = Some(at);
        self.processing_time_ms = self
            .started_at
            .map(|started| (at - started).num_milliseconds().max(0) as u64);
        Ok(())
    }

    /// Check the result/error invariant for the current status
    pub fn check_invariant(&self) -> Result<(), String> {
        let consistent = match self.status {
            TaskState::Pending | TaskState::Running => {
                self.result.is_none() && self.error.is_none() && self.completed_at.is_none()
            }
            TaskState::Completed => self.result.is_some() && self.error.is_none(),
            TaskState::Failed => self.result.is_none() && self.error.is_some(),
        };

        if consistent {
            Ok(())
        } else {
            Err(format!(
                "task {} in state '{}' has result={} error={}",
                self.id,
                self.status,
                self.result.is_some(),
                self.error.is_some()
            ))
        }
    }
}

/// Unvalidated persisted shape, checked on the way in
#[derive(Debug, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub status: TaskState,
    pub query: String,
    pub document_ref: DocumentRef,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processing_time_ms: Option<u64>,
    #[serde(default)]
    pub result: Option<AnalysisResult>,
    #[serde(default)]
    pub error: Option<TaskFailure>,
}

impl TryFrom<TaskRecord> for AnalysisTask {
    type Error = String;

    fn try_from(record: TaskRecord) -> Result<Self, Self::Error> {
        let task = AnalysisTask {
            id: record.id,
            status: record.status,
            query: record.query,
            document_ref: record.document_ref,
            created_at: record.created_at,
            started_at: record.started_at,
            completed_at: record.completed_at,
            processing_time_ms: record.processing_time_ms,
            result: record.result,
            error: record.error,
        };
        task.check_invariant()?;
        Ok(task)
    }
}

/// Counts by status across the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: u64,
    pub pending: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
}

impl TaskStats {
    pub fn record(&mut self, state: TaskState) {
        self.total += 1;
        match state {
            TaskState::Pending => self.pending += 1,
            TaskState::Running => self.running += 1,
            TaskState::Completed => self.completed += 1,
            TaskState::Failed => self.failed += 1,
        }
    }

    /// Completed tasks as a percentage of all tasks
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analysis::{
        Confidence, DocumentType, FinancialMetrics, InvestmentAction, Recommendation,
    };
    use crate::state_machine::StateMachineError;

    fn sample_result() -> AnalysisResult {
        AnalysisResult {
            company_name: None,
            document_type: DocumentType::FinancialDocument,
            metrics: FinancialMetrics::new(),
            recommendation: Recommendation {
                action: InvestmentAction::Hold,
                rationale: "flat".to_string(),
                confidence: Confidence::clamped(0.5),
            },
            risks: vec![],
            summary: String::new(),
        }
    }

    fn pending_task() -> AnalysisTask {
        AnalysisTask::new(
            TaskId::new(),
            "Analyze growth",
            DocumentRef::inline("Revenue grew"),
            Utc::now(),
        )
    }

    #[test]
    fn test_lifecycle_preserves_invariant() {
        let mut task = pending_task();
        assert_eq!(task.status(), TaskState::Pending);
        assert!(task.check_invariant().is_ok());

        task.start(Utc::now()).unwrap();
        assert_eq!(task.status(), TaskState::Running);
        assert!(task.result().is_none() && task.error().is_none());
        assert!(task.check_invariant().is_ok());

        task.complete(sample_result(), Utc::now()).unwrap();
        assert_eq!(task.status(), TaskState::Completed);
        assert!(task.result().is_some() && task.error().is_none());
        assert!(task.completed_at().is_some());
        assert!(task.processing_time_ms().is_some());
        assert!(task.check_invariant().is_ok());
    }

    #[test]
    fn test_rejected_transition_does_not_mutate() {
        let mut task = pending_task();
        let before = task.clone();

        let err = task.complete(sample_result(), Utc::now()).unwrap_err();
        assert_eq!(
            err,
            StateMachineError::InvalidTransition {
                from: TaskState::Pending,
                event: TaskEvent::Complete,
            }
        );
        assert_eq!(task, before);

        task.start(Utc::now()).unwrap();
        let running = task.clone();
        assert!(task.start(Utc::now()).is_err());
        assert_eq!(task, running);
    }

    #[test]
    fn test_abandon_records_duration() {
        let mut task = pending_task();
        let started = Utc::now() - chrono::Duration::seconds(90);
        task.start(started).unwrap();
        task.abandon(Utc::now()).unwrap();

        assert_eq!(task.status(), TaskState::Failed);
        match task.error() {
            Some(TaskFailure::Abandoned { running_for_secs }) => assert!(*running_for_secs >= 90),
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[test]
    fn test_deserialize_rejects_broken_invariant() {
        let mut task = pending_task();
        task.start(Utc::now()).unwrap();
        task.complete(sample_result(), Utc::now()).unwrap();

        let mut json = serde_json::to_value(&task).unwrap();
        assert!(serde_json::from_value::<AnalysisTask>(json.clone()).is_ok());

        json["result"] = serde_json::Value::Null;
        assert!(serde_json::from_value::<AnalysisTask>(json).is_err());
    }

    #[test]
    fn test_record_shape() {
        let task = pending_task();
        let json = serde_json::to_value(&task).unwrap();
        for key in [
            "id",
            "status",
            "query",
            "document_ref",
            "created_at",
            "completed_at",
            "result",
            "error",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn test_task_id_round_trip_through_string() {
        let id = TaskId::new();
        let parsed: TaskId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<TaskId>().is_err());
    }

    #[test]
    fn test_stats_success_rate() {
        let mut stats = TaskStats::default();
        assert_eq!(stats.success_rate(), 0.0);
        stats.record(TaskState::Completed);
        stats.record(TaskState::Failed);
        stats.record(TaskState::Completed);
        stats.record(TaskState::Pending);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.success_rate(), 50.0);
    }

    #[test]
    fn test_document_ref_digest() {
        let a = DocumentRef::from_bytes("a.pdf", b"same");
        let b = DocumentRef::from_bytes("b.pdf", b"same");
        assert_eq!(a.sha256, b.sha256);
        assert_eq!(a.sha256.len(), 64);
        assert_eq!(a.byte_len, 4);
    }
}
