#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Finsight Core
//!
//! Asynchronous analysis pipeline for financial documents.
//!
//! ## Overview
//!
//! A submitted (document, query) pair becomes a durable task. A bounded queue
//! hands tasks to a fixed pool of workers, and each worker drives its task
//! through four analysis stages in order: Verify, Extract-Metrics, Recommend
//! and Assess-Risk. The outcome, a structured [`models::AnalysisResult`] or a
//! typed [`orchestration::PipelineError`], is recorded on the task, which
//! callers retrieve by identifier.
//!
//! ## Module Organization
//!
//! - [`document`] - Document loading and text extraction
//! - [`stages`] - The stage capability and the four built-in stages
//! - [`orchestration`] - Pipeline orchestrator and system bootstrap
//! - [`storage`] - Task store (in-memory and PostgreSQL)
//! - [`messaging`] - Bounded task queue
//! - [`execution`] - Worker pool
//! - [`services`] - Submission facade (sync and async paths)
//! - [`state_machine`] - Task lifecycle states and transitions
//! - [`models`] - Task record and analysis result types
//! - [`config`] - Layered configuration
//! - [`error`] - Crate-level error type
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use finsight_core::config::FinsightConfig;
//! use finsight_core::orchestration::AnalysisSystem;
//!
//! # async fn example() -> finsight_core::Result<()> {
//! let system = AnalysisSystem::bootstrap(&FinsightConfig::default()).await?;
//!
//! let task_id = system
//!     .service()
//!     .analyze_async("Revenue grew 20% YoY, Net Income $5M", "Analyze growth")
//!     .await?;
//!
//! let task = system.service().get_task(task_id).await?;
//! println!("{} is {}", task.id(), task.status());
//!
//! system.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod document;
pub mod error;
pub mod execution;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod services;
pub mod stages;
pub mod state_machine;
pub mod storage;

pub use config::{ConfigManager, FinsightConfig};
pub use error::{FinsightError, Result};
pub use models::{AnalysisResult, AnalysisTask, TaskId};
pub use orchestration::{AnalysisSystem, PipelineError, PipelineOrchestrator};
pub use services::{AnalysisService, SubmissionError};
pub use state_machine::TaskState;
pub use storage::{InMemoryTaskStore, TaskStore, TaskStoreError};
