//! PostgreSQL task store.
//!
//! Transitions are single conditional `UPDATE ... WHERE status = <required>`
//! statements, so concurrent callers race inside the database and exactly
//! one of them matches the row. A CHECK constraint mirrors the result/error
//! invariant of [`AnalysisTask`].

use super::{TaskStore, TaskStoreError, TaskStoreResult};
use crate::config::DatabaseConfig;
use crate::constants::events;
use crate::logging::log_task_operation;
use crate::models::{
    AnalysisResult, AnalysisTask, DocumentRef, TaskFailure, TaskId, TaskRecord, TaskStats,
};
use crate::state_machine::{TaskEvent, TaskState, TaskStateMachine};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS finsight_analysis_tasks (
    id UUID PRIMARY KEY,
    status TEXT NOT NULL CHECK (status IN ('pending', 'running', 'completed', 'failed')),
    query TEXT NOT NULL,
    document_source TEXT NOT NULL,
    document_sha256 TEXT NOT NULL,
    document_bytes BIGINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    started_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ,
    processing_time_ms BIGINT,
    result JSONB,
    error JSONB,
    CONSTRAINT finsight_task_outcome CHECK (
        (status IN ('pending', 'running') AND result IS NULL AND error IS NULL)
        OR (status = 'completed' AND result IS NOT NULL AND error IS NULL)
        OR (status = 'failed' AND result IS NULL AND error IS NOT NULL)
    )
)
"#;

const CREATE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_finsight_analysis_tasks_created_at
    ON finsight_analysis_tasks (created_at DESC)
"#;

const SELECT_COLUMNS: &str = "id, status, query, document_source, document_sha256, \
     document_bytes, created_at, started_at, completed_at, processing_time_ms, result, error";

#[derive(Debug, Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

fn db_error(e: sqlx::Error) -> TaskStoreError {
    TaskStoreError::Database(e.to_string())
}

impl PgTaskStore {
    /// Wrap an existing pool; call [`PgTaskStore::ensure_schema`] before use
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using the database section of the configuration and create the
    /// table if it does not exist yet
    pub async fn connect(config: &DatabaseConfig) -> TaskStoreResult<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| TaskStoreError::Database("database.url is not set".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await
            .map_err(|e| TaskStoreError::Database(format!("Failed to create pool: {e}")))?;

        let store = Self::new(pool);
        store.ensure_schema().await?;

        info!(
            max_connections = config.max_connections,
            "🗄️ PgTaskStore connected"
        );
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ensure_schema(&self) -> TaskStoreResult<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        sqlx::query(CREATE_INDEX)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    /// A conditional update matched no row: report whether the task is
    /// missing or in the wrong state
    async fn rejected(&self, task_id: TaskId, event: TaskEvent) -> TaskStoreError {
        let row = sqlx::query("SELECT status FROM finsight_analysis_tasks WHERE id = $1")
            .bind(task_id.as_uuid())
            .fetch_optional(&self.pool)
            .await;

        match row {
            Err(e) => db_error(e),
            Ok(None) => TaskStoreError::NotFound(task_id),
            Ok(Some(row)) => {
                let status: String = match row.try_get("status") {
                    Ok(status) => status,
                    Err(e) => return db_error(e),
                };
                match status.parse::<TaskState>() {
                    Ok(from) => TaskStoreError::InvalidTransition {
                        task_id,
                        from,
                        event,
                    },
                    Err(e) => TaskStoreError::Corrupt(e),
                }
            }
        }
    }

    /// Run a conditional transition and translate "no row matched"
    async fn transition(
        &self,
        task_id: TaskId,
        event: TaskEvent,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> TaskStoreResult<()> {
        let updated = query
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        match updated {
            Some(_) => Ok(()),
            None => Err(self.rejected(task_id, event).await),
        }
    }
}

fn required_status(event: TaskEvent) -> &'static str {
    TaskStateMachine::required_state(event).as_str()
}

fn row_to_task(row: &PgRow) -> TaskStoreResult<AnalysisTask> {
    let corrupt = |e: sqlx::Error| TaskStoreError::Corrupt(e.to_string());

    let status: String = row.try_get("status").map_err(corrupt)?;
    let document_bytes: i64 = row.try_get("document_bytes").map_err(corrupt)?;
    let processing_time_ms: Option<i64> = row.try_get("processing_time_ms").map_err(corrupt)?;
    let result: Option<Json<AnalysisResult>> = row.try_get("result").map_err(corrupt)?;
    let error: Option<Json<TaskFailure>> = row.try_get("error").map_err(corrupt)?;

    let record = TaskRecord {
        id: TaskId::from_uuid(row.try_get::<Uuid, _>("id").map_err(corrupt)?),
        status: status.parse().map_err(TaskStoreError::Corrupt)?,
        query: row.try_get("query").map_err(corrupt)?,
        document_ref: DocumentRef {
            source: row.try_get("document_source").map_err(corrupt)?,
            sha256: row.try_get("document_sha256").map_err(corrupt)?,
            byte_len: usize::try_from(document_bytes)
                .map_err(|e| TaskStoreError::Corrupt(e.to_string()))?,
        },
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(corrupt)?,
        started_at: row.try_get("started_at").map_err(corrupt)?,
        completed_at: row.try_get("completed_at").map_err(corrupt)?,
        processing_time_ms: processing_time_ms.map(|ms| ms.max(0) as u64),
        result: result.map(|Json(result)| result),
        error: error.map(|Json(error)| error),
    };

    AnalysisTask::try_from(record).map_err(TaskStoreError::Corrupt)
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn create(&self, query: &str, document_ref: DocumentRef) -> TaskStoreResult<TaskId> {
        let task_id = TaskId::new();

        sqlx::query(
            "INSERT INTO finsight_analysis_tasks \
             (id, status, query, document_source, document_sha256, document_bytes, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(task_id.as_uuid())
        .bind(TaskState::Pending.as_str())
        .bind(query)
        .bind(&document_ref.source)
        .bind(&document_ref.sha256)
        .bind(document_ref.byte_len as i64)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        log_task_operation(events::TASK_CREATED, Some(task_id), "pending", None);
        Ok(task_id)
    }

    async fn mark_running(&self, task_id: TaskId) -> TaskStoreResult<()> {
        let query = sqlx::query(
            "UPDATE finsight_analysis_tasks SET status = $3, started_at = $4 \
             WHERE id = $1 AND status = $2 RETURNING id",
        )
        .bind(task_id.as_uuid())
        .bind(required_status(TaskEvent::Start))
        .bind(TaskState::Running.as_str())
        .bind(Utc::now());

        self.transition(task_id, TaskEvent::Start, query).await
    }

    async fn complete(&self, task_id: TaskId, result: AnalysisResult) -> TaskStoreResult<()> {
        let query = sqlx::query(
            "UPDATE finsight_analysis_tasks SET status = $3, completed_at = $4, \
             processing_time_ms = GREATEST(0, (EXTRACT(EPOCH FROM ($4 - started_at)) * 1000)::BIGINT), \
             result = $5 \
             WHERE id = $1 AND status = $2 RETURNING id",
        )
        .bind(task_id.as_uuid())
        .bind(required_status(TaskEvent::Complete))
        .bind(TaskState::Completed.as_str())
        .bind(Utc::now())
        .bind(Json(result));

        self.transition(task_id, TaskEvent::Complete, query).await
    }

    async fn fail(&self, task_id: TaskId, failure: TaskFailure) -> TaskStoreResult<()> {
        let query = sqlx::query(
            "UPDATE finsight_analysis_tasks SET status = $3, completed_at = $4, \
             processing_time_ms = GREATEST(0, (EXTRACT(EPOCH FROM ($4 - started_at)) * 1000)::BIGINT), \
             error = $5 \
             WHERE id = $1 AND status = $2 RETURNING id",
        )
        .bind(task_id.as_uuid())
        .bind(required_status(TaskEvent::Fail))
        .bind(TaskState::Failed.as_str())
        .bind(Utc::now())
        .bind(Json(failure));

        self.transition(task_id, TaskEvent::Fail, query).await
    }

    async fn get(&self, task_id: TaskId) -> TaskStoreResult<AnalysisTask> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM finsight_analysis_tasks WHERE id = $1"
        ))
        .bind(task_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(TaskStoreError::NotFound(task_id))?;

        row_to_task(&row)
    }

    async fn recent(&self, limit: usize) -> TaskStoreResult<Vec<AnalysisTask>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM finsight_analysis_tasks \
             ORDER BY created_at DESC, id DESC LIMIT $1"
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_task).collect()
    }

    async fn stats(&self) -> TaskStoreResult<TaskStats> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS count FROM finsight_analysis_tasks GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut stats = TaskStats::default();
        for row in rows {
            let status: String = row.try_get("status").map_err(db_error)?;
            let count: i64 = row.try_get("count").map_err(db_error)?;
            let count = count.max(0) as u64;
            stats.total += count;
            match status.parse().map_err(TaskStoreError::Corrupt)? {
                TaskState::Pending => stats.pending += count,
                TaskState::Running => stats.running += count,
                TaskState::Completed => stats.completed += count,
                TaskState::Failed => stats.failed += count,
            }
        }
        Ok(stats)
    }

    async fn abandon_stale(&self, older_than: Duration) -> TaskStoreResult<Vec<TaskId>> {
        let now = Utc::now();
        let cutoff = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| now.checked_sub_signed(age));
        let Some(cutoff) = cutoff else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            "UPDATE finsight_analysis_tasks SET status = $2, completed_at = $3, \
             processing_time_ms = GREATEST(0, (EXTRACT(EPOCH FROM ($3 - started_at)) * 1000)::BIGINT), \
             error = jsonb_build_object('kind', 'abandoned', 'running_for_secs', \
                 GREATEST(0, EXTRACT(EPOCH FROM ($3 - started_at))::BIGINT)) \
             WHERE status = $1 AND started_at < $4 RETURNING id",
        )
        .bind(required_status(TaskEvent::Abandon))
        .bind(TaskState::Failed.as_str())
        .bind(now)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter()
            .map(|row| {
                row.try_get::<Uuid, _>("id")
                    .map(TaskId::from_uuid)
                    .map_err(db_error)
            })
            .collect()
    }
}
