//! Assess-Risk: rule-based findings from the metrics, the recommendation and
//! disclosures in the text. Findings are returned most severe first.

use super::{AnalysisStage, StageInput, StageKind, StageOutcome, StageOutput};
use crate::models::{FinancialMetrics, Recommendation, RiskCategory, RiskFinding, Severity};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

fn finding(
    category: RiskCategory,
    severity: Severity,
    description: impl Into<String>,
    mitigation: impl Into<String>,
) -> RiskFinding {
    RiskFinding {
        category,
        severity,
        description: description.into(),
        mitigation: mitigation.into(),
    }
}

fn legal_disclosure() -> &'static Regex {
    static LEGAL: OnceLock<Regex> = OnceLock::new();
    LEGAL.get_or_init(|| {
        Regex::new(r"(?i)\b(?:litigation|lawsuits?|investigations?|regulatory\s+(?:action|inquiry|review))\b")
            .expect("static regex is valid")
    })
}

pub fn assess(text: &str, metrics: &FinancialMetrics, recommendation: &Recommendation) -> Vec<RiskFinding> {
    let mut findings = Vec::new();

    if let Some(leverage) = metrics.value("debt_to_equity") {
        if leverage > 2.0 {
            findings.push(finding(
                RiskCategory::Financial,
                Severity::High,
                format!("High leverage with debt to equity of {leverage}"),
                "Review debt maturities and covenant headroom",
            ));
        } else if leverage > 1.0 {
            findings.push(finding(
                RiskCategory::Financial,
                Severity::Medium,
                format!("Elevated leverage with debt to equity of {leverage}"),
                "Track refinancing costs as rates move",
            ));
        }
    }

    if metrics.value("net_income").is_some_and(|v| v < 0.0) {
        findings.push(finding(
            RiskCategory::Financial,
            Severity::High,
            "Company reported a net loss",
            "Confirm the path to profitability before sizing a position",
        ));
    }

    if metrics.value("operating_cash_flow").is_some_and(|v| v < 0.0) {
        findings.push(finding(
            RiskCategory::Financial,
            Severity::High,
            "Operating cash flow is negative",
            "Check cash runway and upcoming financing needs",
        ));
    }

    if let Some(growth) = metrics.value("revenue_growth_pct") {
        if growth < 0.0 {
            findings.push(finding(
                RiskCategory::Market,
                Severity::High,
                format!("Revenue contracted by {}%", growth.abs()),
                "Identify whether the decline is cyclical or structural",
            ));
        }
    }

    if metrics.value("profit_margin").is_some_and(|v| v < 5.0) {
        findings.push(finding(
            RiskCategory::Operational,
            Severity::Medium,
            "Thin profit margin leaves little room for cost increases",
            "Watch input costs and pricing power",
        ));
    }

    if legal_disclosure().is_match(text) {
        findings.push(finding(
            RiskCategory::Strategic,
            Severity::Medium,
            "Document discloses legal or regulatory proceedings",
            "Assess potential liabilities disclosed in the notes",
        ));
    }

    if recommendation.confidence.value() < 0.5 {
        findings.push(finding(
            RiskCategory::Market,
            Severity::Medium,
            "Recommendation rests on limited evidence",
            "Corroborate with additional filings before acting",
        ));
    }

    if metrics.len() < 3 {
        findings.push(finding(
            RiskCategory::Operational,
            Severity::Low,
            "Few figures were disclosed in the document",
            "Obtain full financial statements",
        ));
    }

    if findings.is_empty() {
        findings.push(finding(
            RiskCategory::Market,
            Severity::Low,
            "General market volatility",
            "Diversify the portfolio and keep a long-term perspective",
        ));
    }

    // Stable sort keeps rule order within a severity
    findings.sort_by(|a, b| b.severity.cmp(&a.severity));
    findings
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RiskAssessmentStage;

#[async_trait]
impl AnalysisStage for RiskAssessmentStage {
    fn kind(&self) -> StageKind {
        StageKind::AssessRisk
    }

    async fn evaluate(&self, input: StageInput<'_>) -> StageOutcome {
        let metrics = input.prior.require_metrics(self.kind())?;
        let recommendation = input.prior.require_recommendation(self.kind())?;
        Ok(StageOutput::Risks(assess(input.context(), metrics, recommendation)))
    }
}
