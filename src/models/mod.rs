pub mod analysis;
pub mod task;

// Re-export core models for easy access
pub use analysis::{
    AnalysisResult, Confidence, DocumentType, FinancialMetrics, InvestmentAction, MetricUnit,
    MetricValue, Recommendation, RiskCategory, RiskFinding, Severity,
};
pub use task::{AnalysisTask, DocumentRef, TaskFailure, TaskId, TaskRecord, TaskStats};
