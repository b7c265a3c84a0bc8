//! Pipeline error taxonomy.
//!
//! These are the errors a synchronous caller sees and the ones persisted on
//! a failed task, so they are serializable and carry only owned data.

use crate::document::DocumentError;
use crate::stages::{StageFailure, StageFailureReason, StageKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum PipelineError {
    /// The document could not be turned into usable text
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Verify rejected the document; later stages did not run
    #[error("Not a financial document: {reason}")]
    NotAFinancialDocument { reason: String },

    #[error("Stage '{stage}' failed: {reason}")]
    StageFailed {
        stage: StageKind,
        reason: StageFailureReason,
    },
}

impl PipelineError {
    /// Stage that failed, if the failure came from a stage
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            Self::StageFailed { stage, .. } => Some(*stage),
            Self::NotAFinancialDocument { .. } => Some(StageKind::Verify),
            Self::Document(_) => None,
        }
    }

    /// Transient failures a worker may retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StageFailed { reason, .. } if reason.is_retryable())
    }
}

impl From<StageFailure> for PipelineError {
    fn from(failure: StageFailure) -> Self {
        Self::StageFailed {
            stage: failure.stage,
            reason: failure.reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_shape() {
        let err = PipelineError::StageFailed {
            stage: StageKind::ExtractMetrics,
            reason: StageFailureReason::Timeout,
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "stage_failed");
        assert_eq!(json["detail"]["stage"], "extract_metrics");
        assert_eq!(json["detail"]["reason"]["kind"], "timeout");

        let back: PipelineError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_retryable_only_for_transient_stage_failures() {
        let timeout = PipelineError::from(StageFailure::new(
            StageKind::Recommend,
            StageFailureReason::Timeout,
        ));
        assert!(timeout.is_retryable());
        assert_eq!(timeout.stage(), Some(StageKind::Recommend));

        assert!(!PipelineError::Document(DocumentError::Empty).is_retryable());
        assert!(!PipelineError::NotAFinancialDocument {
            reason: "no terms".into()
        }
        .is_retryable());
    }
}
