//! # Services
//!
//! The submission facade external callers use. See [`AnalysisService`].

pub mod analysis_service;

pub use analysis_service::{AnalysisService, SubmissionError};
