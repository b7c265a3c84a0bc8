//! # System Constants
//!
//! Lifecycle event names used in structured logs, stage identifiers and the
//! defaults shared by configuration and the built-in stages.

/// Lifecycle events emitted through [`crate::logging`]
pub mod events {
    // Task lifecycle events
    pub const TASK_CREATED: &str = "task.created";
    pub const TASK_ENQUEUED: &str = "task.enqueued";
    pub const TASK_STARTED: &str = "task.started";
    pub const TASK_COMPLETED: &str = "task.completed";
    pub const TASK_FAILED: &str = "task.failed";
    pub const TASK_ABANDONED: &str = "task.abandoned";
    pub const TASK_RETRY_REQUESTED: &str = "task.retry_requested";

    // Stage lifecycle events
    pub const STAGE_STARTED: &str = "stage.started";
    pub const STAGE_COMPLETED: &str = "stage.completed";
    pub const STAGE_FAILED: &str = "stage.failed";

    // Pipeline events
    pub const PIPELINE_SHORT_CIRCUITED: &str = "pipeline.short_circuited";
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
}

/// Stage identifiers as they appear in logs and persisted errors
pub mod stages {
    pub const VERIFY: &str = "verify";
    pub const EXTRACT_METRICS: &str = "extract_metrics";
    pub const RECOMMEND: &str = "recommend";
    pub const ASSESS_RISK: &str = "assess_risk";
}

/// System-wide defaults
pub mod system {
    /// Query used when the caller submits a blank one
    pub const DEFAULT_QUERY: &str = "Analyze this financial document for investment insights";

    /// Every PDF starts with this header; checked before any extraction work
    pub const PDF_MAGIC: &[u8] = b"%PDF-";

    /// Source name recorded for documents submitted as plain text
    pub const INLINE_SOURCE: &str = "inline";

    pub const DEFAULT_STAGE_TIMEOUT_MS: u64 = 300_000;
    pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
    pub const DEFAULT_WORKER_COUNT: usize = 4;
    pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 50 * 1024 * 1024;
    pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 8_000;
    pub const DEFAULT_MIN_FINANCIAL_TERMS: usize = 2;
}
