//! # Structured Logging Module
//!
//! Environment-aware console logging using the tracing ecosystem. Logs go to
//! stdout; the level comes from `RUST_LOG` when set, otherwise from the
//! environment (`FINSIGHT_ENV`). Set `FINSIGHT_LOG_FORMAT=json` for one JSON
//! object per line.
//!
//! The helpers at the bottom give task and stage lifecycle logs a fixed set
//! of fields so they can be filtered by `task_id`, `stage` and `operation`.

use crate::models::TaskId;
use chrono::Utc;
use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize console logging once per process
///
/// Safe to call repeatedly and safe to call when another subscriber was
/// installed first; later calls are no-ops.
pub fn init_tracing() {
    TRACING_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let json = use_json_format();
        let use_ansi = !json && IsTerminal::is_terminal(&std::io::stdout());

        let console_layer = if json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(use_ansi)
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        };

        if tracing_subscriber::registry()
            .with(console_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        } else {
            tracing::info!(
                environment = %environment,
                log_level = %log_level,
                json = json,
                ansi_colors = use_ansi,
                "🔧 LOGGING: Console logging initialized"
            );
        }
    });
}

/// Current environment from `FINSIGHT_ENV`
fn get_environment() -> String {
    std::env::var("FINSIGHT_ENV").unwrap_or_else(|_| "development".to_string())
}

/// `RUST_LOG` if set, otherwise a default per environment
fn get_log_level(environment: &str) -> String {
    if let Ok(level) = std::env::var("RUST_LOG") {
        return level;
    }

    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

fn use_json_format() -> bool {
    std::env::var("FINSIGHT_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Task lifecycle event
pub fn log_task_operation(
    operation: &str,
    task_id: Option<TaskId>,
    status: &str,
    details: Option<&str>,
) {
    let task_id = task_id.map(|id| id.to_string());
    tracing::info!(
        operation = %operation,
        task_id = task_id.as_deref(),
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 TASK_OPERATION"
    );
}

/// Stage lifecycle event; `task_id` is absent on the synchronous path
pub fn log_stage_operation(
    operation: &str,
    task_id: Option<TaskId>,
    stage: &str,
    status: &str,
    duration_ms: Option<u64>,
    details: Option<&str>,
) {
    let task_id = task_id.map(|id| id.to_string());
    tracing::info!(
        operation = %operation,
        task_id = task_id.as_deref(),
        stage = %stage,
        status = %status,
        duration_ms = duration_ms,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🔧 STAGE_OPERATION"
    );
}

/// Generic error logging with unified format
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR: {} failed in {}: {}", operation, component, error
    );
}
