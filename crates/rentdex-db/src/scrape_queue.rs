//! Database operations for `scrape_queue`.
//!
//! Items move `pending → processing → done`, with `retry` standing in for
//! `pending` after a transient failure. Claiming is a single conditional
//! `UPDATE ... FOR UPDATE SKIP LOCKED`, so any number of workers (in any
//! number of processes) can claim from the same source without ever
//! receiving the same item.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rentdex_core::{QueueStatus, MAX_QUEUE_ATTEMPTS};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `scrape_queue` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueueItemRow {
    pub id: i64,
    pub source: String,
    pub canonical_url: String,
    pub source_listing_id: Option<String>,
    pub status: String,
    pub attempts: i32,
    pub priority: i32,
    pub last_error: Option<String>,
    /// Set while the item is `processing`; completion must present it.
    pub claim_token: Option<Uuid>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueItemRow {
    /// Parsed `status`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidValue`] for a status outside the schema's
    /// CHECK constraint.
    pub fn queue_status(&self) -> Result<QueueStatus, DbError> {
        parse_status(&self.status)
    }
}

const ITEM_COLUMNS: &str = "id, source, canonical_url, source_listing_id, status, attempts, \
     priority, last_error, claim_token, claimed_at, created_at, updated_at";

fn parse_status(raw: &str) -> Result<QueueStatus, DbError> {
    raw.parse().map_err(|_| DbError::InvalidValue {
        column: "scrape_queue.status",
        value: raw.to_owned(),
    })
}

/// What `enqueue` did with a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    Inserted,
    /// A `done` item was reset to `pending` for a fresh scrape.
    Requeued,
    /// The item is already waiting or being processed; only its timestamp moved.
    AlreadyQueued,
}

/// How a claimed item finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Success,
    /// Permanent outcome that is not an error (not found, filtered, no price).
    Filtered { reason: String },
    /// Transient failure; retried until [`MAX_QUEUE_ATTEMPTS`] is reached.
    Failed { error: String },
}

/// Per-status item counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub pending: i64,
    pub processing: i64,
    pub retry: i64,
    pub done: i64,
}

impl QueueCounts {
    #[must_use]
    pub fn total(&self) -> i64 {
        self.pending + self.processing + self.retry + self.done
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Idempotently adds a URL to the queue.
///
/// Re-enqueuing a `pending`, `retry` or `processing` item refreshes
/// `updated_at` and fills a missing `source_listing_id`. Re-enqueuing a
/// `done` item resets it to `pending` with zero attempts and the new
/// priority.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn enqueue(
    pool: &PgPool,
    source: &str,
    canonical_url: &str,
    source_listing_id: Option<&str>,
    priority: i32,
) -> Result<EnqueueResult, DbError> {
    let (inserted, prior_status): (bool, Option<String>) = sqlx::query_as(
        "WITH prior AS ( \
             SELECT status FROM scrape_queue WHERE source = $1 AND canonical_url = $2 \
         ) \
         INSERT INTO scrape_queue (source, canonical_url, source_listing_id, priority) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (source, canonical_url) DO UPDATE SET \
             source_listing_id = COALESCE(scrape_queue.source_listing_id, EXCLUDED.source_listing_id), \
             priority    = CASE WHEN scrape_queue.status = 'done' \
                                THEN EXCLUDED.priority ELSE scrape_queue.priority END, \
             attempts    = CASE WHEN scrape_queue.status = 'done' \
                                THEN 0 ELSE scrape_queue.attempts END, \
             last_error  = CASE WHEN scrape_queue.status = 'done' \
                                THEN NULL ELSE scrape_queue.last_error END, \
             status      = CASE WHEN scrape_queue.status = 'done' \
                                THEN 'pending' ELSE scrape_queue.status END, \
             updated_at  = NOW() \
         RETURNING (xmax = 0) AS inserted, (SELECT status FROM prior) AS prior_status",
    )
    .bind(source)
    .bind(canonical_url)
    .bind(source_listing_id)
    .bind(priority)
    .fetch_one(pool)
    .await?;

    Ok(match (inserted, prior_status.as_deref()) {
        (true, _) => EnqueueResult::Inserted,
        (false, Some("done")) => EnqueueResult::Requeued,
        (false, _) => EnqueueResult::AlreadyQueued,
    })
}

/// Atomically claims up to `limit` waiting items for `source`.
///
/// Items are taken in `priority DESC, created_at ASC` order, moved to
/// `processing` and tagged with one fresh claim token. Rows locked by a
/// concurrent claimer are skipped, never shared. Ids in `exclude` are never
/// claimed; a job passes the ids it already handled so a retried or
/// released item waits for the next run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn claim_batch(
    pool: &PgPool,
    source: &str,
    limit: i64,
    exclude: &[i64],
) -> Result<Vec<QueueItemRow>, DbError> {
    let claim_token = Uuid::new_v4();
    let mut rows = sqlx::query_as::<_, QueueItemRow>(&format!(
        "UPDATE scrape_queue \
         SET status = 'processing', claim_token = $3, claimed_at = NOW(), updated_at = NOW() \
         WHERE id IN ( \
             SELECT id FROM scrape_queue \
             WHERE source = $1 AND status IN ('pending', 'retry') \
               AND NOT (id = ANY($4)) \
             ORDER BY priority DESC, created_at ASC, id ASC \
             LIMIT $2 \
             FOR UPDATE SKIP LOCKED \
         ) \
         RETURNING {ITEM_COLUMNS}"
    ))
    .bind(source)
    .bind(limit.max(0))
    .bind(claim_token)
    .bind(exclude)
    .fetch_all(pool)
    .await?;

    // RETURNING order is unspecified.
    rows.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
    Ok(rows)
}

/// Finalizes a claimed item.
///
/// Every completion increments `attempts`. A failure moves the item to
/// `retry`, or to `done` once it has failed [`MAX_QUEUE_ATTEMPTS`] times.
/// The update only applies while `claim_token` still matches, so a worker
/// whose claim was recovered cannot overwrite the new owner's result.
///
/// Returns the item's new status, or `None` if the claim was lost.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn complete_item(
    pool: &PgPool,
    id: i64,
    claim_token: Uuid,
    outcome: &CompletionOutcome,
) -> Result<Option<QueueStatus>, DbError> {
    let (failed, message) = match outcome {
        CompletionOutcome::Success => (false, None),
        CompletionOutcome::Filtered { reason } => (false, Some(reason.as_str())),
        CompletionOutcome::Failed { error } => (true, Some(error.as_str())),
    };

    let status: Option<String> = sqlx::query_scalar(
        "UPDATE scrape_queue SET \
             attempts    = attempts + 1, \
             status      = CASE WHEN $3 AND attempts + 1 < $5 THEN 'retry' ELSE 'done' END, \
             last_error  = $4, \
             claim_token = NULL, \
             updated_at  = NOW() \
         WHERE id = $1 AND claim_token = $2 AND status = 'processing' \
         RETURNING status",
    )
    .bind(id)
    .bind(claim_token)
    .bind(failed)
    .bind(message)
    .bind(MAX_QUEUE_ATTEMPTS)
    .fetch_optional(pool)
    .await?;

    status.as_deref().map(parse_status).transpose()
}

/// Returns a claimed item to the waiting state without counting an attempt.
///
/// Used when the pacer decides to skip an item for this run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn release_claim(pool: &PgPool, id: i64, claim_token: Uuid) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE scrape_queue SET \
             status      = CASE WHEN attempts > 0 THEN 'retry' ELSE 'pending' END, \
             claim_token = NULL, \
             claimed_at  = NULL, \
             updated_at  = NOW() \
         WHERE id = $1 AND claim_token = $2 AND status = 'processing'",
    )
    .bind(id)
    .bind(claim_token)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Recovers items whose worker died mid-claim.
///
/// Items claimed before `claimed_before` count one failed attempt and go to
/// `retry` (or `done` at the attempt cap). `source = None` sweeps every
/// source. Returns the number of recovered items.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn requeue_stuck_claims(
    pool: &PgPool,
    source: Option<&str>,
    claimed_before: DateTime<Utc>,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE scrape_queue SET \
             attempts    = attempts + 1, \
             status      = CASE WHEN attempts + 1 < $3 THEN 'retry' ELSE 'done' END, \
             last_error  = 'claim expired before completion', \
             claim_token = NULL, \
             updated_at  = NOW() \
         WHERE status = 'processing' \
           AND claimed_at < $2 \
           AND ($1::text IS NULL OR source = $1)",
    )
    .bind(source)
    .bind(claimed_before)
    .bind(MAX_QUEUE_ATTEMPTS)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Which of `urls` already sit in the queue as `pending`, `retry` or `processing`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn live_queue_urls(
    pool: &PgPool,
    source: &str,
    urls: &[String],
) -> Result<HashSet<String>, DbError> {
    if urls.is_empty() {
        return Ok(HashSet::new());
    }
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT canonical_url FROM scrape_queue \
         WHERE source = $1 AND canonical_url = ANY($2) \
           AND status IN ('pending', 'retry', 'processing')",
    )
    .bind(source)
    .bind(urls)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Item counts by status, for one source or all of them.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or
/// [`DbError::InvalidValue`] for an unknown stored status.
pub async fn queue_counts(pool: &PgPool, source: Option<&str>) -> Result<QueueCounts, DbError> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*) FROM scrape_queue \
         WHERE ($1::text IS NULL OR source = $1) \
         GROUP BY status",
    )
    .bind(source)
    .fetch_all(pool)
    .await?;

    let mut counts = QueueCounts::default();
    for (status, n) in rows {
        match parse_status(&status)? {
            QueueStatus::Pending => counts.pending = n,
            QueueStatus::Processing => counts.processing = n,
            QueueStatus::Retry => counts.retry = n,
            QueueStatus::Done => counts.done = n,
        }
    }
    Ok(counts)
}

/// Fetches a single item by `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_queue_item(pool: &PgPool, id: i64) -> Result<QueueItemRow, DbError> {
    sqlx::query_as::<_, QueueItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM scrape_queue WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_total_sums_every_status() {
        let counts = QueueCounts {
            pending: 3,
            processing: 1,
            retry: 2,
            done: 10,
        };
        assert_eq!(counts.total(), 16);
    }

    #[test]
    fn parse_status_rejects_unknown_values() {
        assert_eq!(parse_status("retry").unwrap(), QueueStatus::Retry);
        assert!(matches!(
            parse_status("claimed"),
            Err(DbError::InvalidValue { .. })
        ));
    }
}
