//! # Pipeline Orchestrator
//!
//! Runs Verify, Extract-Metrics, Recommend and Assess-Risk in order over one
//! document and query. Each stage sees the outputs of the stages before it.
//! The first failure stops the run and later stages are not invoked. A
//! document that Verify rejects short-circuits with
//! [`PipelineError::NotAFinancialDocument`].
//!
//! Every stage invocation is bounded by the configured timeout, and a stage
//! that panics is reported as an internal stage failure instead of taking
//! the caller down with it.
//!
//! The orchestrator also owns the [`DocumentLoader`], so PDF text extraction
//! for queued documents happens inside the worker on a blocking thread.

use super::errors::PipelineError;
use crate::config::{FinsightConfig, StageSettings};
use crate::constants::{events, system::INLINE_SOURCE};
use crate::document::{ensure_text, DocumentError, DocumentLoader};
use crate::logging::log_stage_operation;
use crate::models::{AnalysisResult, RiskFinding, TaskId};
use crate::stages::{
    AnalysisStages, PriorOutputs, StageFailure, StageFailureReason, StageInput, StageKind,
    StageOutput,
};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Stateless between runs; share one instance behind an `Arc`
#[derive(Debug, Clone)]
pub struct PipelineOrchestrator {
    stages: AnalysisStages,
    stage_timeout: Duration,
    settings: Arc<StageSettings>,
    loader: DocumentLoader,
}

/// Identifies a run in logs
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub task_id: Option<TaskId>,
    pub source: &'a str,
}

impl Default for RunContext<'_> {
    fn default() -> Self {
        Self {
            task_id: None,
            source: INLINE_SOURCE,
        }
    }
}

impl PipelineOrchestrator {
    pub fn new(stages: AnalysisStages, stage_timeout: Duration, settings: StageSettings) -> Self {
        Self {
            stages,
            stage_timeout,
            settings: Arc::new(settings),
            loader: DocumentLoader::default(),
        }
    }

    pub fn from_config(config: &FinsightConfig, stages: AnalysisStages) -> Self {
        Self::new(
            stages,
            config.pipeline.stage_timeout(),
            config.stages.clone(),
        )
        .with_loader(DocumentLoader::from_config(&config.document))
    }

    pub fn with_loader(mut self, loader: DocumentLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn loader(&self) -> &DocumentLoader {
        &self.loader
    }

    /// Extract document text on a blocking thread
    pub async fn extract_text(&self, bytes: Arc<[u8]>) -> Result<String, PipelineError> {
        let loader = self.loader.clone();
        let text = tokio::task::spawn_blocking(move || loader.extract_text(&bytes))
            .await
            .map_err(|e| DocumentError::Unreadable(format!("text extraction did not finish: {e}")))??;
        Ok(text)
    }

    pub fn settings(&self) -> &StageSettings {
        &self.settings
    }

    pub fn stage_timeout(&self) -> Duration {
        self.stage_timeout
    }

    /// Analyze plain text with no task attached
    pub async fn run(&self, text: &str, query: &str) -> Result<AnalysisResult, PipelineError> {
        self.run_with_context(RunContext::default(), text, query)
            .await
    }

    pub async fn run_with_context(
        &self,
        ctx: RunContext<'_>,
        text: &str,
        query: &str,
    ) -> Result<AnalysisResult, PipelineError> {
        ensure_text(text)?;

        let mut prior = PriorOutputs::default();
        let mut risks: Option<Vec<RiskFinding>> = None;

        for kind in StageKind::ORDERED {
            match self.invoke(ctx, kind, text, query, &prior).await? {
                StageOutput::Verification(verification) => {
                    if !verification.is_financial_document {
                        log_stage_operation(
                            events::PIPELINE_SHORT_CIRCUITED,
                            ctx.task_id,
                            kind.name(),
                            "rejected",
                            None,
                            Some(&verification.reason),
                        );
                        return Err(PipelineError::NotAFinancialDocument {
                            reason: verification.reason,
                        });
                    }
                    prior.verification = Some(verification);
                }
                StageOutput::Metrics(metrics) => prior.metrics = Some(metrics),
                StageOutput::Recommendation(recommendation) => {
                    prior.recommendation = Some(recommendation)
                }
                StageOutput::Risks(findings) => risks = Some(findings),
            }
        }

        let result = assemble(prior, risks, query).ok_or_else(|| {
            PipelineError::from(StageFailure::new(
                StageKind::AssessRisk,
                StageFailureReason::Internal("pipeline finished with missing stage output".into()),
            ))
        })?;

        let task_label = ctx.task_id.map(|id| id.to_string());
        debug!(
            task_id = task_label.as_deref(),
            action = %result.recommendation.action,
            risks = result.risks.len(),
            "{}", events::PIPELINE_COMPLETED
        );

        Ok(result)
    }

    async fn invoke(
        &self,
        ctx: RunContext<'_>,
        kind: StageKind,
        text: &str,
        query: &str,
        prior: &PriorOutputs,
    ) -> Result<StageOutput, PipelineError> {
        let stage = self.stages.get(kind);
        let input = StageInput {
            source: ctx.source,
            text,
            query,
            prior,
            settings: &self.settings,
        };

        debug!(stage = %kind, source = %ctx.source, "{}", events::STAGE_STARTED);
        let started = Instant::now();
        let guarded = AssertUnwindSafe(stage.evaluate(input)).catch_unwind();

        let outcome = match timeout(self.stage_timeout, guarded).await {
            Err(_) => Err(StageFailure::new(kind, StageFailureReason::Timeout)),
            Ok(Err(panic)) => Err(StageFailure::new(
                kind,
                StageFailureReason::Internal(format!("stage panicked: {}", panic_message(&*panic))),
            )),
            Ok(Ok(outcome)) => outcome,
        };

        // Failures are attributed to the stage that ran, whatever it reported
        let outcome = match outcome {
            Ok(output) if output.kind() == kind => Ok(output),
            Ok(output) => Err(StageFailure::new(
                kind,
                StageFailureReason::Internal(format!(
                    "stage returned {} output",
                    output.kind()
                )),
            )),
            Err(failure) => Err(StageFailure::new(kind, failure.reason)),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(output) => {
                log_stage_operation(
                    events::STAGE_COMPLETED,
                    ctx.task_id,
                    kind.name(),
                    "ok",
                    Some(duration_ms),
                    None,
                );
                Ok(output)
            }
            Err(failure) => {
                let details = failure.reason.to_string();
                let task_label = ctx.task_id.map(|id| id.to_string());
                warn!(
                    task_id = task_label.as_deref(),
                    stage = %kind,
                    duration_ms = duration_ms,
                    reason = %details,
                    "{}", events::STAGE_FAILED
                );
                Err(failure.into())
            }
        }
    }
}

fn assemble(
    prior: PriorOutputs,
    risks: Option<Vec<RiskFinding>>,
    query: &str,
) -> Option<AnalysisResult> {
    let verification = prior.verification?;
    let metrics = prior.metrics?;
    let recommendation = prior.recommendation?;
    let mut risks = risks?;
    risks.sort_by(|a, b| b.severity.cmp(&a.severity));

    let subject = verification
        .company_name
        .clone()
        .unwrap_or_else(|| "the issuer".to_string());

    let mut figures = Vec::new();
    if let Some(revenue) = metrics.value("revenue") {
        figures.push(format!("revenue {}", format_amount(revenue)));
    }
    if let Some(growth) = metrics.value("revenue_growth_pct") {
        figures.push(format!("revenue growth {growth}%"));
    }
    if let Some(income) = metrics.value("net_income") {
        figures.push(format!("net income {}", format_amount(income)));
    }
    let figures = if figures.is_empty() {
        "no headline figures".to_string()
    } else {
        figures.join(", ")
    };

    let top_risk = risks
        .first()
        .map(|r| format!(" Top risk ({:?}): {}.", r.severity, r.description))
        .unwrap_or_default();

    let summary = format!(
        "{} for {} ({}). Asked \"{}\": {} with {:.0}% confidence.{}",
        verification.document_type,
        subject,
        figures,
        query.trim(),
        recommendation.action,
        recommendation.confidence.value() * 100.0,
        top_risk
    );

    Some(AnalysisResult {
        company_name: verification.company_name,
        document_type: verification.document_type,
        metrics,
        recommendation,
        risks,
        summary,
    })
}

fn format_amount(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();
    if abs >= 1e9 {
        format!("{sign}${:.1}B", abs / 1e9)
    } else if abs >= 1e6 {
        format!("{sign}${:.1}M", abs / 1e6)
    } else {
        format!("{sign}${abs:.0}")
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures::flate_pdf;
    use crate::models::InvestmentAction;

    fn orchestrator() -> PipelineOrchestrator {
        PipelineOrchestrator::from_config(&FinsightConfig::default(), AnalysisStages::builtin())
    }

    #[tokio::test]
    async fn test_happy_path_with_builtin_stages() {
        let result = orchestrator()
            .run("Revenue grew 20% YoY, Net Income $5M", "Should I buy?")
            .await
            .unwrap();

        assert_eq!(result.metrics.value("revenue_growth_pct"), Some(20.0));
        assert_eq!(result.metrics.value("net_income"), Some(5_000_000.0));
        assert_eq!(result.recommendation.action, InvestmentAction::Buy);
        assert!(!result.risks.is_empty());
        assert!(result.summary.contains("net income $5.0M"));
        assert!(result.summary.contains("Should I buy?"));
    }

    #[tokio::test]
    async fn test_non_financial_text_short_circuits() {
        let err = orchestrator()
            .run("The quick brown fox jumps over the lazy dog", "Should I buy?")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotAFinancialDocument { .. }));
    }

    #[tokio::test]
    async fn test_empty_text_fails_before_any_stage() {
        let err = orchestrator().run("   ", "q").await.unwrap_err();
        assert_eq!(err, PipelineError::Document(DocumentError::Empty));
    }

    #[tokio::test]
    async fn test_extract_text_runs_the_loader() {
        let pipeline = orchestrator();
        let pdf: Arc<[u8]> = flate_pdf(&["Net income was $410 million"]).into();
        let text = pipeline.extract_text(pdf).await.unwrap();
        assert!(text.contains("Net income"));

        let blank: Arc<[u8]> = flate_pdf(&[]).into();
        assert_eq!(
            pipeline.extract_text(blank).await.unwrap_err(),
            PipelineError::Document(DocumentError::Empty)
        );

        let broken: Arc<[u8]> = Arc::from(&b"%PDF-1.4\n%%EOF\n"[..]);
        assert!(matches!(
            pipeline.extract_text(broken).await.unwrap_err(),
            PipelineError::Document(_)
        ));
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("kaboom"));
        assert_eq!(panic_message(&*payload), "kaboom");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(&*payload), "unknown panic payload");
    }
}
