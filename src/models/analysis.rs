//! # Analysis Result Model
//!
//! The aggregate produced by a successful pipeline run. Once attached to a
//! task it is only ever handed out by shared reference.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// Unit a metric value is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricUnit {
    /// Absolute currency amount (not scaled)
    Currency,
    /// Percentage points, e.g. `20.0` for 20%
    Percent,
    /// Dimensionless ratio, e.g. debt to equity
    Ratio,
    /// Currency amount per share
    PerShare,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub value: f64,
    pub unit: MetricUnit,
}

impl MetricValue {
    pub fn new(value: f64, unit: MetricUnit) -> Self {
        Self { value, unit }
    }
}

/// Named financial figures extracted from a document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinancialMetrics {
    figures: BTreeMap<String, MetricValue>,
}

impl FinancialMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a figure; the first occurrence of a name wins
    pub fn insert(&mut self, name: impl Into<String>, value: MetricValue) -> bool {
        let name = name.into();
        if self.figures.contains_key(&name) {
            return false;
        }
        self.figures.insert(name, value);
        true
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.figures.get(name)
    }

    /// Raw value of a figure regardless of its unit
    pub fn value(&self, name: &str) -> Option<f64> {
        self.figures.get(name).map(|m| m.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.figures.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.figures.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.figures.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.figures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.figures.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentAction {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for InvestmentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("buy"),
            Self::Sell => f.write_str("sell"),
            Self::Hold => f.write_str("hold"),
        }
    }
}

/// Confidence score, always within `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    /// Returns `None` for values outside `[0, 1]` and for NaN
    pub fn new(value: f64) -> Option<Self> {
        (0.0..=1.0).contains(&value).then_some(Self(value))
    }

    /// Clamp any finite value into range; NaN maps to zero
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Confidence {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("confidence {value} is outside [0, 1]"))
    }
}

impl From<Confidence> for f64 {
    fn from(confidence: Confidence) -> Self {
        confidence.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: InvestmentAction,
    pub rationale: String,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Financial,
    Market,
    Operational,
    Strategic,
}

/// Ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFinding {
    pub category: RiskCategory,
    pub severity: Severity,
    pub description: String,
    pub mitigation: String,
}

/// Broad classification of a financial document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    QuarterlyReport,
    AnnualReport,
    QuarterlyFiling,
    EarningsReport,
    #[default]
    FinancialDocument,
}

impl DocumentType {
    /// Classify from the document text; the first matching rule wins
    pub fn identify(text: &str) -> Self {
        static QUARTER: OnceLock<Regex> = OnceLock::new();
        let quarter = QUARTER.get_or_init(|| {
            Regex::new(r"(?i)quarterly report|\bq[1-4]\b").expect("static regex is valid")
        });

        let lower = text.to_lowercase();
        if quarter.is_match(text) {
            Self::QuarterlyReport
        } else if lower.contains("annual report") || lower.contains("10-k") {
            Self::AnnualReport
        } else if lower.contains("10-q") {
            Self::QuarterlyFiling
        } else if lower.contains("earnings") {
            Self::EarningsReport
        } else {
            Self::FinancialDocument
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::QuarterlyReport => "Quarterly Report",
            Self::AnnualReport => "Annual Report",
            Self::QuarterlyFiling => "Quarterly Filing (10-Q)",
            Self::EarningsReport => "Earnings Report",
            Self::FinancialDocument => "Financial Document",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Aggregate of all four stage outputs for one document and query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub company_name: Option<String>,
    pub document_type: DocumentType,
    pub metrics: FinancialMetrics,
    pub recommendation: Recommendation,
    /// Ordered most severe first
    pub risks: Vec<RiskFinding>,
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_bounds() {
        assert!(Confidence::new(0.0).is_some());
        assert!(Confidence::new(1.0).is_some());
        assert!(Confidence::new(1.01).is_none());
        assert!(Confidence::new(-0.1).is_none());
        assert!(Confidence::new(f64::NAN).is_none());

        assert_eq!(Confidence::clamped(3.0).value(), 1.0);
        assert_eq!(Confidence::clamped(f64::NAN).value(), 0.0);
    }

    #[test]
    fn test_confidence_rejects_out_of_range_json() {
        assert!(serde_json::from_str::<Confidence>("0.75").is_ok());
        assert!(serde_json::from_str::<Confidence>("1.5").is_err());
    }

    #[test]
    fn test_metrics_first_occurrence_wins() {
        let mut metrics = FinancialMetrics::new();
        assert!(metrics.insert("revenue", MetricValue::new(10.0, MetricUnit::Currency)));
        assert!(!metrics.insert("revenue", MetricValue::new(99.0, MetricUnit::Currency)));
        assert_eq!(metrics.value("revenue"), Some(10.0));
        assert_eq!(metrics.len(), 1);
    }

    #[test]
    fn test_metrics_serialize_as_plain_map() {
        let mut metrics = FinancialMetrics::new();
        metrics.insert("eps", MetricValue::new(1.25, MetricUnit::PerShare));
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["eps"]["value"], 1.25);
        assert_eq!(json["eps"]["unit"], "per_share");
    }

    #[test]
    fn test_document_type_identification() {
        assert_eq!(
            DocumentType::identify("Q3 results for the period"),
            DocumentType::QuarterlyReport
        );
        assert_eq!(
            DocumentType::identify("Form 10-K annual filing"),
            DocumentType::AnnualReport
        );
        assert_eq!(
            DocumentType::identify("Form 10-Q for the period"),
            DocumentType::QuarterlyFiling
        );
        assert_eq!(
            DocumentType::identify("Earnings call transcript"),
            DocumentType::EarningsReport
        );
        assert_eq!(
            DocumentType::identify("Revenue grew 20% YoY"),
            DocumentType::FinancialDocument
        );
        // "q1" inside a word is not a quarter marker
        assert_eq!(
            DocumentType::identify("faq1 appendix"),
            DocumentType::FinancialDocument
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }
}
