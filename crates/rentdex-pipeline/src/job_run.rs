//! Wraps a job body in a `job_runs` row.

use std::future::Future;

use rentdex_core::JobType;
use serde::Serialize;
use sqlx::PgPool;

use crate::PipelineError;

/// Creates a `running` job row, runs `job`, then marks the row `succeeded`
/// with the serialized summary as its counts, or `failed` with the error.
///
/// Work the job already committed stays in place when it fails.
///
/// # Errors
///
/// Returns the job's own error, or [`PipelineError::Db`] if the run row
/// cannot be created or completed.
pub async fn run_tracked<T, F, Fut>(
    pool: &PgPool,
    job_type: JobType,
    source: Option<&str>,
    job: F,
) -> Result<T, PipelineError>
where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let run = rentdex_db::create_job_run(pool, job_type, source).await?;
    tracing::info!(run_id = run.id, job = %job_type, source = source.unwrap_or("-"), "job started");

    match job().await {
        Ok(summary) => {
            let counts = serde_json::to_value(&summary).unwrap_or_else(|_| serde_json::json!({}));
            if let Err(err) = rentdex_db::complete_job_run(pool, run.id, &counts).await {
                fail_run_best_effort(pool, run.id, job_type, &err.to_string()).await;
                return Err(err.into());
            }
            tracing::info!(run_id = run.id, job = %job_type, %counts, "job succeeded");
            Ok(summary)
        }
        Err(err) => {
            tracing::error!(run_id = run.id, job = %job_type, error = %err, "job failed");
            fail_run_best_effort(pool, run.id, job_type, &err.to_string()).await;
            Err(err)
        }
    }
}

/// Attempt to mark a job run as failed, logging any secondary error.
async fn fail_run_best_effort(pool: &PgPool, run_id: i64, job_type: JobType, message: &str) {
    let counts = serde_json::json!({});
    if let Err(mark_err) = rentdex_db::fail_job_run(pool, run_id, &counts, message).await {
        tracing::error!(
            run_id,
            job = %job_type,
            error = %mark_err,
            "failed to mark job run as failed"
        );
    }
}
