//! # Analysis Stages
//!
//! The four stage functions the pipeline runs in fixed order:
//! Verify, Extract-Metrics, Recommend, Assess-Risk.
//!
//! A stage receives the document text, the query, the outputs of the stages
//! before it and the shared [`StageSettings`]. It returns a typed partial
//! result or a [`StageFailure`]. Stages hold no state between invocations and
//! know nothing about tasks, queues or persistence.
//!
//! The built-in stages are rule based. Any other implementation (a remote
//! model, a scoring service) plugs in through [`AnalysisStage`] and
//! [`AnalysisStages::with_stage`].

pub mod metrics;
pub mod recommend;
pub mod risk;
pub mod verify;

use crate::config::StageSettings;
use crate::constants::stages as names;
use crate::models::{DocumentType, FinancialMetrics, Recommendation, RiskFinding};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use metrics::MetricExtractionStage;
pub use recommend::RecommendationStage;
pub use risk::RiskAssessmentStage;
pub use verify::VerifyStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Verify,
    ExtractMetrics,
    Recommend,
    AssessRisk,
}

impl StageKind {
    /// Execution order
    pub const ORDERED: [StageKind; 4] = [
        StageKind::Verify,
        StageKind::ExtractMetrics,
        StageKind::Recommend,
        StageKind::AssessRisk,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Verify => names::VERIFY,
            Self::ExtractMetrics => names::EXTRACT_METRICS,
            Self::Recommend => names::RECOMMEND,
            Self::AssessRisk => names::ASSESS_RISK,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StageFailureReason {
    #[error("timed out")]
    Timeout,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl StageFailureReason {
    /// Transient failures a worker may retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::UpstreamUnavailable(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Stage '{stage}' failed: {reason}")]
pub struct StageFailure {
    pub stage: StageKind,
    pub reason: StageFailureReason,
}

impl StageFailure {
    pub fn new(stage: StageKind, reason: StageFailureReason) -> Self {
        Self { stage, reason }
    }

    pub fn invalid_input(stage: StageKind, message: impl Into<String>) -> Self {
        Self::new(stage, StageFailureReason::InvalidInput(message.into()))
    }
}

/// Verify's judgement on the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub is_financial_document: bool,
    pub document_type: DocumentType,
    pub company_name: Option<String>,
    /// Distinct financial terms found, lowercased
    pub matched_terms: Vec<String>,
    pub reason: String,
}

/// Typed partial result of one stage
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Verification(Verification),
    Metrics(FinancialMetrics),
    Recommendation(Recommendation),
    Risks(Vec<RiskFinding>),
}

impl StageOutput {
    /// The stage this output belongs to
    pub fn kind(&self) -> StageKind {
        match self {
            Self::Verification(_) => StageKind::Verify,
            Self::Metrics(_) => StageKind::ExtractMetrics,
            Self::Recommendation(_) => StageKind::Recommend,
            Self::Risks(_) => StageKind::AssessRisk,
        }
    }
}

pub type StageOutcome = Result<StageOutput, StageFailure>;

/// Outputs of the stages that already ran
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorOutputs {
    pub verification: Option<Verification>,
    pub metrics: Option<FinancialMetrics>,
    pub recommendation: Option<Recommendation>,
}

impl PriorOutputs {
    pub fn require_metrics(&self, stage: StageKind) -> Result<&FinancialMetrics, StageFailure> {
        self.metrics
            .as_ref()
            .ok_or_else(|| StageFailure::invalid_input(stage, "metrics from extract_metrics are missing"))
    }

    pub fn require_recommendation(
        &self,
        stage: StageKind,
    ) -> Result<&Recommendation, StageFailure> {
        self.recommendation
            .as_ref()
            .ok_or_else(|| StageFailure::invalid_input(stage, "recommendation from recommend is missing"))
    }
}

/// Everything a stage invocation sees
#[derive(Debug, Clone, Copy)]
pub struct StageInput<'a> {
    /// Where the text came from; [`crate::constants::system::INLINE_SOURCE`] for plain text
    pub source: &'a str,
    pub text: &'a str,
    pub query: &'a str,
    pub prior: &'a PriorOutputs,
    pub settings: &'a StageSettings,
}

impl<'a> StageInput<'a> {
    /// Leading slice of the text the stage should look at
    pub fn context(&self) -> &'a str {
        context_window(self.text, self.settings.max_context_chars)
    }
}

#[async_trait]
pub trait AnalysisStage: Send + Sync {
    fn kind(&self) -> StageKind;

    async fn evaluate(&self, input: StageInput<'_>) -> StageOutcome;
}

/// One implementation per stage kind
#[derive(Clone)]
pub struct AnalysisStages {
    verify: Arc<dyn AnalysisStage>,
    extract_metrics: Arc<dyn AnalysisStage>,
    recommend: Arc<dyn AnalysisStage>,
    assess_risk: Arc<dyn AnalysisStage>,
}

impl AnalysisStages {
    /// The rule-based implementations shipped with the crate
    pub fn builtin() -> Self {
        Self {
            verify: Arc::new(VerifyStage),
            extract_metrics: Arc::new(MetricExtractionStage),
            recommend: Arc::new(RecommendationStage),
            assess_risk: Arc::new(RiskAssessmentStage),
        }
    }

    /// Replace the implementation for the stage's own kind
    pub fn with_stage(mut self, stage: Arc<dyn AnalysisStage>) -> Self {
        match stage.kind() {
            StageKind::Verify => self.verify = stage,
            StageKind::ExtractMetrics => self.extract_metrics = stage,
            StageKind::Recommend => self.recommend = stage,
            StageKind::AssessRisk => self.assess_risk = stage,
        }
        self
    }

    pub fn get(&self, kind: StageKind) -> &Arc<dyn AnalysisStage> {
        match kind {
            StageKind::Verify => &self.verify,
            StageKind::ExtractMetrics => &self.extract_metrics,
            StageKind::Recommend => &self.recommend,
            StageKind::AssessRisk => &self.assess_risk,
        }
    }
}

impl Default for AnalysisStages {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for AnalysisStages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisStages").finish_non_exhaustive()
    }
}

/// At most `max_chars` leading characters of `text`, cut on a char boundary
pub fn context_window(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
