//! Recommend: score the extracted metrics and pick buy, sell or hold.

use super::{AnalysisStage, StageInput, StageKind, StageOutcome, StageOutput};
use crate::models::{Confidence, FinancialMetrics, InvestmentAction, Recommendation};
use async_trait::async_trait;

/// A scored observation about one metric
#[derive(Debug, Clone, PartialEq)]
struct Signal {
    score: i32,
    note: String,
}

fn signal(score: i32, note: impl Into<String>) -> Signal {
    Signal {
        score,
        note: note.into(),
    }
}

fn collect_signals(metrics: &FinancialMetrics) -> Vec<Signal> {
    let mut signals = Vec::new();

    if let Some(growth) = metrics.value("revenue_growth_pct") {
        signals.push(match growth {
            g if g > 10.0 => signal(2, format!("strong revenue growth of {g}%")),
            g if g > 0.0 => signal(1, format!("revenue growth of {g}%")),
            g if g < 0.0 => signal(-2, format!("revenue declined {}%", g.abs())),
            _ => signal(0, "flat revenue"),
        });
    }

    if let Some(income) = metrics.value("net_income") {
        signals.push(if income > 0.0 {
            signal(1, "profitable")
        } else {
            signal(-2, "loss-making")
        });
    }

    if let Some(margin) = metrics.value("profit_margin") {
        if margin >= 15.0 {
            signals.push(signal(1, format!("healthy margin of {margin}%")));
        } else if margin < 5.0 {
            signals.push(signal(-1, format!("thin margin of {margin}%")));
        }
    }

    if let Some(leverage) = metrics.value("debt_to_equity") {
        if leverage > 2.0 {
            signals.push(signal(-2, format!("high leverage ({leverage}x debt to equity)")));
        } else if leverage > 1.0 {
            signals.push(signal(-1, format!("elevated leverage ({leverage}x debt to equity)")));
        }
    }

    if let Some(cash_flow) = metrics.value("operating_cash_flow") {
        if cash_flow < 0.0 {
            signals.push(signal(-1, "negative operating cash flow"));
        }
    }

    if let Some(eps) = metrics.value("eps") {
        if eps < 0.0 {
            signals.push(signal(-1, "negative earnings per share"));
        }
    }

    signals
}

/// Deterministic recommendation for a set of metrics
pub fn recommend(metrics: &FinancialMetrics, query: &str) -> Recommendation {
    let signals = collect_signals(metrics);

    if signals.is_empty() {
        return Recommendation {
            action: InvestmentAction::Hold,
            rationale: format!(
                "Insufficient figures to answer \"{}\"; holding until fuller disclosures are available.",
                query.trim()
            ),
            confidence: Confidence::clamped(0.3),
        };
    }

    let score: i32 = signals.iter().map(|s| s.score).sum();
    let action = match score {
        s if s >= 2 => InvestmentAction::Buy,
        s if s <= -2 => InvestmentAction::Sell,
        _ => InvestmentAction::Hold,
    };

    let evidence = signals.len().min(5) as f64;
    let confidence = (0.35 + 0.1 * evidence + 0.05 * f64::from(score.abs())).min(0.95);

    let notes: Vec<&str> = signals.iter().map(|s| s.note.as_str()).collect();
    Recommendation {
        action,
        rationale: format!(
            "{} based on {} (score {score:+}) in response to \"{}\".",
            capitalized(action),
            notes.join(", "),
            query.trim()
        ),
        confidence: Confidence::clamped(confidence),
    }
}

fn capitalized(action: InvestmentAction) -> &'static str {
    match action {
        InvestmentAction::Buy => "Buy",
        InvestmentAction::Sell => "Sell",
        InvestmentAction::Hold => "Hold",
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendationStage;

#[async_trait]
impl AnalysisStage for RecommendationStage {
    fn kind(&self) -> StageKind {
        StageKind::Recommend
    }

    async fn evaluate(&self, input: StageInput<'_>) -> StageOutcome {
        let metrics = input.prior.require_metrics(self.kind())?;
        Ok(StageOutput::Recommendation(recommend(metrics, input.query)))
    }
}
