//! Process-queue job: claim queued URLs, scrape them and persist listings.
//!
//! Safety across processes rests on the atomic claim in `scrape_queue`.
//! Inside one process each batch runs on at most `worker_count` concurrent
//! futures; HTTP concurrency is further bounded by the fetch client's
//! [`RequestLimiter`].

use chrono::{Duration, Utc};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use rentdex_core::{AppConfig, JobType};
use rentdex_db::{CompletionOutcome, QueueItemRow};
use rentdex_scraper::{JobLogger, RequestLimiter, SourceAdapter};
use serde::Serialize;
use sqlx::PgPool;

use crate::job_run::run_tracked;
use crate::lifecycle::{persist_listing, plan_listing, ListingPlan};
use crate::shutdown::Shutdown;
use crate::PipelineError;

/// Claims older than this are assumed to belong to a dead worker.
pub const STUCK_CLAIM_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions {
    pub batch_size: usize,
    pub max_items: usize,
    pub worker_count: usize,
    pub khr_per_usd: f64,
    pub stuck_claim_after: Duration,
}

impl ProcessOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            max_items: config.max_items,
            worker_count: config.worker_count,
            khr_per_usd: config.khr_per_usd,
            stuck_claim_after: Duration::minutes(STUCK_CLAIM_MINUTES),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessSummary {
    pub source: String,
    pub recovered: u64,
    pub batches: usize,
    pub claimed: usize,
    pub created: usize,
    pub updated: usize,
    pub filtered: usize,
    pub not_found: usize,
    pub deactivated: usize,
    pub no_price: usize,
    pub skipped: usize,
    pub failed: usize,
    pub lost_claims: usize,
    pub interrupted: bool,
}

/// Per-item result, folded into [`ProcessSummary`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum ItemOutcome {
    Created,
    Updated,
    Filtered { deactivated: bool },
    NotFound { deactivated: bool },
    NoPrice,
    Skipped,
    Failed,
    LostClaim,
}

impl ProcessSummary {
    fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Created => self.created += 1,
            ItemOutcome::Updated => self.updated += 1,
            ItemOutcome::Filtered { deactivated } => {
                self.filtered += 1;
                self.deactivated += usize::from(*deactivated);
            }
            ItemOutcome::NotFound { deactivated } => {
                self.not_found += 1;
                self.deactivated += usize::from(*deactivated);
            }
            ItemOutcome::NoPrice => self.no_price += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Failed => self.failed += 1,
            ItemOutcome::LostClaim => self.lost_claims += 1,
        }
    }
}

struct ItemContext<'a> {
    pool: &'a PgPool,
    adapter: &'a dyn SourceAdapter,
    limiter: &'a RequestLimiter,
    log: &'a dyn JobLogger,
    khr_per_usd: f64,
}

/// Processes up to `max_items` queued URLs for the adapter's source.
///
/// Stuck claims are recovered first. Items are claimed `batch_size` at a
/// time with a paced pause between batches; `shutdown` is checked before
/// every batch. A failing item is retried by a later run and never aborts
/// the job. An item claimed once is not claimed again in the same run.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] if recovering or claiming fails.
pub async fn process_queue(
    pool: &PgPool,
    adapter: &dyn SourceAdapter,
    limiter: &RequestLimiter,
    options: ProcessOptions,
    shutdown: &Shutdown,
    log: &dyn JobLogger,
) -> Result<ProcessSummary, PipelineError> {
    let source = adapter.name();
    run_tracked(pool, JobType::ProcessQueue, Some(source), || async move {
        let mut summary = ProcessSummary {
            source: source.to_owned(),
            ..ProcessSummary::default()
        };

        summary.recovered = rentdex_db::requeue_stuck_claims(
            pool,
            Some(source),
            Utc::now() - options.stuck_claim_after,
        )
        .await?;
        if summary.recovered > 0 {
            log.warn(&format!("recovered {} stuck claims", summary.recovered));
        }

        let ctx = ItemContext {
            pool,
            adapter,
            limiter,
            log,
            khr_per_usd: options.khr_per_usd,
        };
        let batch_size = options.batch_size.max(1);
        let workers = options.worker_count.max(1);
        let mut remaining = options.max_items;
        // Items this run already handled, retried or released wait for the next run.
        let mut handled: Vec<i64> = Vec::new();

        while remaining > 0 {
            if shutdown.is_triggered() {
                log.warn("shutdown requested; stopping before the next batch");
                summary.interrupted = true;
                break;
            }
            if summary.batches > 0 {
                limiter.pause_between_batches().await;
            }

            let limit = i64::try_from(remaining.min(batch_size)).unwrap_or(i64::MAX);
            let items = rentdex_db::claim_batch(pool, source, limit, &handled).await?;
            if items.is_empty() {
                break;
            }
            remaining = remaining.saturating_sub(items.len());
            summary.claimed += items.len();
            summary.batches += 1;
            handled.extend(items.iter().map(|item| item.id));

            let pending: Vec<BoxFuture<'_, ItemOutcome>> = items
                .iter()
                .map(|item| process_item(&ctx, item).boxed())
                .collect();
            let outcomes: Vec<ItemOutcome> = stream::iter(pending)
                .buffer_unordered(workers)
                .collect()
                .await;
            for outcome in &outcomes {
                summary.record(outcome);
            }

            log.info(&format!(
                "batch {}: {} claimed, {} created, {} updated, {} failed so far",
                summary.batches, summary.claimed, summary.created, summary.updated, summary.failed
            ));
        }

        Ok(summary)
    })
    .await
}

async fn process_item(ctx: &ItemContext<'_>, item: &QueueItemRow) -> ItemOutcome {
    let Some(claim_token) = item.claim_token else {
        return ItemOutcome::LostClaim;
    };

    if ctx.limiter.should_skip() {
        return match rentdex_db::release_claim(ctx.pool, item.id, claim_token).await {
            Ok(_) => {
                tracing::debug!(url = %item.canonical_url, "skipping item this run");
                ItemOutcome::Skipped
            }
            Err(err) => {
                tracing::error!(url = %item.canonical_url, error = %err, "failed to release skipped item");
                ItemOutcome::Failed
            }
        };
    }

    let (outcome, completion) = match handle_item(ctx, item).await {
        Ok(done) => done,
        Err(err) => {
            tracing::warn!(
                url = %item.canonical_url,
                attempt = item.attempts + 1,
                error = %err,
                "item failed"
            );
            (
                ItemOutcome::Failed,
                CompletionOutcome::Failed {
                    error: err.to_string(),
                },
            )
        }
    };

    match rentdex_db::complete_item(ctx.pool, item.id, claim_token, &completion).await {
        Ok(Some(_)) => outcome,
        Ok(None) => {
            tracing::warn!(url = %item.canonical_url, "claim lost before completion");
            ItemOutcome::LostClaim
        }
        Err(err) => {
            tracing::error!(url = %item.canonical_url, error = %err, "failed to complete queue item");
            ItemOutcome::Failed
        }
    }
}

async fn handle_item(
    ctx: &ItemContext<'_>,
    item: &QueueItemRow,
) -> Result<(ItemOutcome, CompletionOutcome), PipelineError> {
    let url = item.canonical_url.as_str();
    let Some(scraped) = ctx.adapter.scrape(url, ctx.log).await? else {
        let deactivated = rentdex_db::deactivate_listing_by_url(ctx.pool, url).await?;
        return Ok((
            ItemOutcome::NotFound { deactivated },
            CompletionOutcome::Filtered {
                reason: "listing not found".to_owned(),
            },
        ));
    };

    match plan_listing(
        &item.source,
        url,
        item.source_listing_id.as_deref(),
        scraped,
        ctx.khr_per_usd,
    ) {
        ListingPlan::Filtered { reason } => {
            let deactivated = rentdex_db::deactivate_listing_by_url(ctx.pool, url).await?;
            tracing::debug!(url, %reason, "filtered");
            Ok((
                ItemOutcome::Filtered { deactivated },
                CompletionOutcome::Filtered { reason },
            ))
        }
        ListingPlan::NoPrice => Ok((
            ItemOutcome::NoPrice,
            CompletionOutcome::Filtered {
                reason: "no usable price".to_owned(),
            },
        )),
        ListingPlan::Write(write) => {
            let persisted = persist_listing(ctx.pool, *write, Utc::now()).await?;
            tracing::debug!(
                url,
                listing_id = persisted.listing.id,
                created = persisted.created,
                "listing stored"
            );
            let outcome = if persisted.created {
                ItemOutcome::Created
            } else {
                ItemOutcome::Updated
            };
            Ok((outcome, CompletionOutcome::Success))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn process_queue_future_is_send() {
        fn check(
            pool: &PgPool,
            adapter: &dyn SourceAdapter,
            limiter: &RequestLimiter,
            options: ProcessOptions,
            shutdown: &Shutdown,
            log: &dyn JobLogger,
        ) {
            assert_send(&process_queue(pool, adapter, limiter, options, shutdown, log));
        }
        let _ = check;
    }

    #[test]
    fn summary_counts_deactivations_separately() {
        let mut summary = ProcessSummary::default();
        for outcome in [
            ItemOutcome::Created,
            ItemOutcome::Updated,
            ItemOutcome::Filtered { deactivated: true },
            ItemOutcome::NotFound { deactivated: false },
            ItemOutcome::NotFound { deactivated: true },
            ItemOutcome::Skipped,
            ItemOutcome::Failed,
        ] {
            summary.record(&outcome);
        }

        assert_eq!(summary.created, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.filtered, 1);
        assert_eq!(summary.not_found, 2);
        assert_eq!(summary.deactivated, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
    }
}
