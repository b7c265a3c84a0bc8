//! Extract-Metrics: pull labelled figures out of the text.
//!
//! Each metric has a label pattern. The first figure following a label is
//! parsed with its scale word (`million`, `bn`, `M`, ...) or `%` sign. A
//! percentage found next to a currency metric is recorded as growth, so
//! "Revenue grew 20%" yields `revenue_growth_pct = 20`. The first occurrence
//! of each metric name wins.

use super::{AnalysisStage, StageInput, StageKind, StageOutcome, StageOutput};
use crate::models::{FinancialMetrics, MetricUnit, MetricValue};
use async_trait::async_trait;
use regex::{Captures, Regex};
use std::sync::OnceLock;

struct MetricPattern {
    name: &'static str,
    label: &'static str,
    unit: MetricUnit,
}

const METRIC_PATTERNS: &[MetricPattern] = &[
    MetricPattern {
        name: "revenue",
        label: r"(?:total\s+)?revenues?|net\s+sales",
        unit: MetricUnit::Currency,
    },
    MetricPattern {
        name: "net_income",
        label: r"net\s+(?:income|profit|earnings)",
        unit: MetricUnit::Currency,
    },
    MetricPattern {
        name: "operating_cash_flow",
        label: r"operating\s+cash\s+flows?|cash\s+flows?\s+from\s+operations",
        unit: MetricUnit::Currency,
    },
    MetricPattern {
        name: "total_assets",
        label: r"total\s+assets",
        unit: MetricUnit::Currency,
    },
    MetricPattern {
        name: "profit_margin",
        label: r"(?:net|profit)\s+margin",
        unit: MetricUnit::Percent,
    },
    MetricPattern {
        name: "debt_to_equity",
        label: r"debt[\s-]+to[\s-]+equity(?:\s+ratio)?",
        unit: MetricUnit::Ratio,
    },
    MetricPattern {
        name: "eps",
        label: r"eps|earnings\s+per\s+share",
        unit: MetricUnit::PerShare,
    },
];

/// Label, up to 60 characters of filler, then a figure with optional scale
fn compiled() -> &'static [(&'static MetricPattern, Regex)] {
    static COMPILED: OnceLock<Vec<(&'static MetricPattern, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        METRIC_PATTERNS
            .iter()
            .map(|pattern| {
                let regex = Regex::new(&format!(
                    r"(?i)\b(?:{})\b[^0-9$(\n-]{{0,60}}?(?P<neg>\(|-)?\$?\s?(?P<num>[0-9][0-9,]*(?:\.[0-9]+)?)\)?\s*(?P<scale>%|percent\b|billion\b|bn\b|million\b|mm\b|m\b|thousand\b|k\b|x\b)?",
                    pattern.label
                ))
                .expect("static metric patterns are valid");
                (pattern, regex)
            })
            .collect()
    })
}

/// Scan `text` for every known metric
pub fn extract_metrics(text: &str) -> FinancialMetrics {
    let mut metrics = FinancialMetrics::new();

    for (pattern, regex) in compiled() {
        for caps in regex.captures_iter(text) {
            if let Some((name, value)) = parse_figure(pattern, &caps) {
                metrics.insert(name, value);
            }
        }
    }

    metrics
}

fn parse_figure(pattern: &MetricPattern, caps: &Captures<'_>) -> Option<(String, MetricValue)> {
    let raw: f64 = caps.name("num")?.as_str().replace(',', "").parse().ok()?;
    let value = if caps.name("neg").is_some() { -raw } else { raw };
    let scale = caps
        .name("scale")
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_default();

    let is_percent = scale == "%" || scale == "percent";
    let multiplier = match scale.as_str() {
        "billion" | "bn" => 1e9,
        "million" | "mm" | "m" => 1e6,
        "thousand" | "k" => 1e3,
        _ => 1.0,
    };

    let entry = match pattern.unit {
        MetricUnit::Currency if is_percent => (
            format!("{}_growth_pct", pattern.name),
            MetricValue::new(value, MetricUnit::Percent),
        ),
        MetricUnit::Currency | MetricUnit::PerShare => (
            pattern.name.to_string(),
            MetricValue::new(value * multiplier, pattern.unit),
        ),
        MetricUnit::Percent | MetricUnit::Ratio => {
            (pattern.name.to_string(), MetricValue::new(value, pattern.unit))
        }
    };

    // Figures too long for an f64 overflow to infinity, which JSON cannot carry
    entry.1.value.is_finite().then_some(entry)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricExtractionStage;

#[async_trait]
impl AnalysisStage for MetricExtractionStage {
    fn kind(&self) -> StageKind {
        StageKind::ExtractMetrics
    }

    async fn evaluate(&self, input: StageInput<'_>) -> StageOutcome {
        Ok(StageOutput::Metrics(extract_metrics(input.context())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_and_amount() {
        let metrics = extract_metrics("Revenue grew 20% YoY, Net Income $5M");

        assert_eq!(metrics.value("revenue_growth_pct"), Some(20.0));
        assert_eq!(metrics.get("revenue_growth_pct").unwrap().unit, MetricUnit::Percent);
        assert_eq!(metrics.value("net_income"), Some(5_000_000.0));
        assert_eq!(metrics.get("net_income").unwrap().unit, MetricUnit::Currency);
        assert!(!metrics.contains("revenue"));
    }

    #[test]
    fn test_scales_ratios_and_per_share() {
        let text = "Total revenue of $1,250.5 million. Total assets: $3.25 billion.\n\
                    Debt-to-equity ratio 1.8x. EPS $2.15. Net margin 12.5%.";
        let metrics = extract_metrics(text);

        assert_eq!(metrics.value("revenue"), Some(1_250_500_000.0));
        assert_eq!(metrics.value("total_assets"), Some(3_250_000_000.0));
        assert_eq!(metrics.value("debt_to_equity"), Some(1.8));
        assert_eq!(metrics.value("eps"), Some(2.15));
        assert_eq!(metrics.value("profit_margin"), Some(12.5));
    }

    #[test]
    fn test_negative_figures() {
        let metrics = extract_metrics("Net income was ($2.5 million) and operating cash flow -400k");
        assert_eq!(metrics.value("net_income"), Some(-2_500_000.0));
        assert_eq!(metrics.value("operating_cash_flow"), Some(-400_000.0));
    }

    #[test]
    fn test_first_occurrence_wins() {
        let metrics = extract_metrics("Revenue $10M in Q1. Revenue $12M in Q2.");
        assert_eq!(metrics.value("revenue"), Some(10_000_000.0));
    }

    #[test]
    fn test_overflowing_figures_are_dropped() {
        let text = format!(
            "Revenue ${} and net income $5M. Net margin {}%",
            "9".repeat(400),
            "9".repeat(320)
        );
        let metrics = extract_metrics(&text);

        assert!(!metrics.contains("revenue"));
        assert!(!metrics.contains("profit_margin"));
        assert_eq!(metrics.value("net_income"), Some(5_000_000.0));
        assert!(metrics.iter().all(|(_, metric)| metric.value.is_finite()));
    }

    #[test]
    fn test_no_figures() {
        assert!(extract_metrics("Nothing to see here").is_empty());
    }
}
