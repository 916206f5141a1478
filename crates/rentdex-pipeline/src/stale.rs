use chrono::{Duration, Utc};
use rentdex_core::JobType;
use serde::Serialize;
use sqlx::PgPool;

use crate::job_run::run_tracked;
use crate::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleSummary {
    pub threshold_days: i64,
    pub deactivated: u64,
}

/// Deactivates every active listing not seen for `threshold_days`.
/// Snapshots are kept.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidThreshold`] for a threshold below one
/// day, or [`PipelineError::Db`] if the sweep fails.
pub async fn mark_stale(pool: &PgPool, threshold_days: i64) -> Result<StaleSummary, PipelineError> {
    if threshold_days < 1 {
        return Err(PipelineError::InvalidThreshold(threshold_days));
    }

    run_tracked(pool, JobType::MarkStale, None, || async move {
        let cutoff = Utc::now() - Duration::days(threshold_days);
        let deactivated = rentdex_db::mark_stale_listings(pool, cutoff).await?;
        tracing::info!(threshold_days, deactivated, %cutoff, "stale listings deactivated");
        Ok(StaleSummary {
            threshold_days,
            deactivated,
        })
    })
    .await
}
