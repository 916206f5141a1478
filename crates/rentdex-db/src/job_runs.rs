//! Database operations for `job_runs`.

use chrono::{DateTime, Utc};
use rentdex_core::{JobStatus, JobType};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const MAX_ERROR_MESSAGE_CHARS: usize = 1000;

const JOB_RUN_COLUMNS: &str = "id, public_id, job_type, source, status, \
                               started_at, ended_at, counts, error_message";

/// A row from the `job_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub job_type: String,
    pub source: Option<String>,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Job-specific counters, e.g. `{"claimed": 40, "succeeded": 37}`.
    pub counts: serde_json::Value,
    pub error_message: Option<String>,
}

/// Records the start of a job in `running` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_job_run(
    pool: &PgPool,
    job_type: JobType,
    source: Option<&str>,
) -> Result<JobRunRow, DbError> {
    let row = sqlx::query_as::<_, JobRunRow>(&format!(
        "INSERT INTO job_runs (public_id, job_type, source, status) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {JOB_RUN_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(job_type.as_str())
    .bind(source)
    .bind(JobStatus::Running.as_str())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a running job `succeeded` and stores its counters.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no running job has this `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn complete_job_run(
    pool: &PgPool,
    id: i64,
    counts: &serde_json::Value,
) -> Result<(), DbError> {
    finish(pool, id, JobStatus::Succeeded, counts, None).await
}

/// Marks a running job `failed`. The message is cut to 1000 characters.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no running job has this `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn fail_job_run(
    pool: &PgPool,
    id: i64,
    counts: &serde_json::Value,
    error_message: &str,
) -> Result<(), DbError> {
    let truncated: String = error_message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect();
    finish(pool, id, JobStatus::Failed, counts, Some(&truncated)).await
}

async fn finish(
    pool: &PgPool,
    id: i64,
    status: JobStatus,
    counts: &serde_json::Value,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE job_runs \
         SET status = $1, ended_at = NOW(), counts = $2, error_message = $3 \
         WHERE id = $4 AND status = 'running'",
    )
    .bind(status.as_str())
    .bind(counts)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Returns the most recent `limit` runs, optionally for one job type.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_job_runs(
    pool: &PgPool,
    job_type: Option<JobType>,
    limit: i64,
) -> Result<Vec<JobRunRow>, DbError> {
    let rows = sqlx::query_as::<_, JobRunRow>(&format!(
        "SELECT {JOB_RUN_COLUMNS} \
         FROM job_runs \
         WHERE ($1::text IS NULL OR job_type = $1) \
         ORDER BY started_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(job_type.map(JobType::as_str))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
