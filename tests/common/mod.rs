#![allow(dead_code)]

pub mod pdf;
pub mod stages;
pub mod strategies;

pub use pdf::flate_pdf;
pub use stages::*;

use finsight_core::models::{AnalysisTask, TaskId};
use finsight_core::storage::TaskStore;
use std::time::Duration;

/// Text the built-in stages accept and recommend Buy for
pub const FINANCIAL_TEXT: &str = "Revenue grew 20% YoY, Net Income $5M";

/// Text Verify rejects
pub const NON_FINANCIAL_TEXT: &str = "The quick brown fox jumps over the lazy dog.";

/// Poll until the task reaches a terminal state or `timeout` passes
pub async fn wait_for_terminal(
    store: &dyn TaskStore,
    task_id: TaskId,
    timeout: Duration,
) -> AnalysisTask {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let task = store.get(task_id).await.expect("task exists");
        if task.is_terminal() || tokio::time::Instant::now() >= deadline {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
