//! # Orchestration
//!
//! The pipeline that drives one document through the four analysis stages,
//! and the bootstrap that assembles a running system around it.
//!
//! ## Core Components
//!
//! - **PipelineOrchestrator**: runs Verify, Extract-Metrics, Recommend and
//!   Assess-Risk strictly in order and aggregates their outputs
//! - **PipelineError**: the single failure value a run can produce
//! - **AnalysisSystem**: store, queue, workers and facade built from configuration

pub mod bootstrap;
pub mod errors;
pub mod pipeline;

pub use bootstrap::{AnalysisSystem, SystemStatus};
pub use errors::PipelineError;
pub use pipeline::{PipelineOrchestrator, RunContext};
