//! Discover job: crawl a source's index pages and enqueue listing URLs.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use rentdex_core::{AppConfig, JobType};
use rentdex_db::EnqueueResult;
use rentdex_scraper::{canonicalize_url, DiscoveredUrl, JobLogger, SourceAdapter};
use serde::Serialize;
use sqlx::PgPool;

use crate::job_run::run_tracked;
use crate::PipelineError;

/// Queue priority for URLs with no stored listing.
pub const NEW_URL_PRIORITY: i32 = 1;
/// Queue priority for stored listings due for a refresh.
pub const STALE_URL_PRIORITY: i32 = 0;

#[derive(Debug, Clone, Copy)]
pub struct DiscoverOptions {
    pub max_urls: usize,
    pub rescrape_after_days: i64,
}

impl DiscoverOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_urls: config.max_urls,
            rescrape_after_days: config.rescrape_after_days,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoverSummary {
    pub source: String,
    pub found: usize,
    pub invalid: usize,
    pub unique: usize,
    pub already_queued: usize,
    pub fresh: usize,
    pub new: usize,
    pub stale: usize,
    pub capped: usize,
    pub inserted: usize,
    pub requeued: usize,
}

/// URLs selected for enqueueing, already split and capped.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EnqueuePlan {
    pub new: Vec<DiscoveredUrl>,
    pub stale: Vec<DiscoveredUrl>,
    pub fresh: usize,
    pub capped: usize,
}

/// Canonicalizes and de-duplicates discovered URLs, keeping the first
/// occurrence. Returns the unique URLs and the number that failed to parse.
#[must_use]
pub fn canonicalize_discovered(found: Vec<DiscoveredUrl>) -> (Vec<DiscoveredUrl>, usize) {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    let mut invalid = 0;
    for discovered in found {
        match canonicalize_url(&discovered.url) {
            Ok(url) => {
                if seen.insert(url.clone()) {
                    unique.push(DiscoveredUrl {
                        url,
                        source_listing_id: discovered.source_listing_id,
                    });
                }
            }
            Err(err) => {
                tracing::debug!(url = %discovered.url, error = %err, "dropping unparseable url");
                invalid += 1;
            }
        }
    }
    (unique, invalid)
}

/// Splits candidates (already filtered against the live queue) into new
/// and stale URLs. New URLs fill the `max_urls` budget first.
#[must_use]
pub fn plan_enqueue(
    candidates: Vec<DiscoveredUrl>,
    last_seen: &HashMap<String, DateTime<Utc>>,
    rescrape_before: DateTime<Utc>,
    max_urls: usize,
) -> EnqueuePlan {
    let mut plan = EnqueuePlan::default();
    for candidate in candidates {
        match last_seen.get(&candidate.url) {
            None => plan.new.push(candidate),
            Some(seen) if *seen < rescrape_before => plan.stale.push(candidate),
            Some(_) => plan.fresh += 1,
        }
    }

    let total = plan.new.len() + plan.stale.len();
    if total > max_urls {
        plan.capped = total - max_urls;
        plan.new.truncate(max_urls);
        plan.stale.truncate(max_urls - plan.new.len());
    }
    plan
}

/// Runs the adapter's discovery and enqueues what is new or due for a
/// refresh.
///
/// URLs already pending, retrying or processing are left alone. Brand new
/// URLs are queued at [`NEW_URL_PRIORITY`], stale ones at
/// [`STALE_URL_PRIORITY`], at most `max_urls` in total.
///
/// # Errors
///
/// Returns [`PipelineError::Scraper`] if discovery fails outright, or
/// [`PipelineError::Db`] on a store error.
pub async fn discover(
    pool: &PgPool,
    adapter: &dyn SourceAdapter,
    options: DiscoverOptions,
    log: &dyn JobLogger,
) -> Result<DiscoverSummary, PipelineError> {
    let source = adapter.name();
    run_tracked(pool, JobType::Discover, Some(source), || async move {
        let found = adapter.discover(log).await?;
        let mut summary = DiscoverSummary {
            source: source.to_owned(),
            found: found.len(),
            ..DiscoverSummary::default()
        };

        let (unique, invalid) = canonicalize_discovered(found);
        summary.invalid = invalid;
        summary.unique = unique.len();

        let urls: Vec<String> = unique.iter().map(|d| d.url.clone()).collect();
        let live = rentdex_db::live_queue_urls(pool, source, &urls).await?;
        let candidates: Vec<DiscoveredUrl> =
            unique.into_iter().filter(|d| !live.contains(&d.url)).collect();
        summary.already_queued = live.len();

        let candidate_urls: Vec<String> = candidates.iter().map(|d| d.url.clone()).collect();
        let last_seen = rentdex_db::listings_last_seen(pool, &candidate_urls).await?;
        let rescrape_before = Utc::now() - Duration::days(options.rescrape_after_days);
        let plan = plan_enqueue(candidates, &last_seen, rescrape_before, options.max_urls);
        summary.new = plan.new.len();
        summary.stale = plan.stale.len();
        summary.fresh = plan.fresh;
        summary.capped = plan.capped;

        let batches = [
            (plan.new, NEW_URL_PRIORITY),
            (plan.stale, STALE_URL_PRIORITY),
        ];
        for (urls, priority) in batches {
            for discovered in urls {
                let result = rentdex_db::enqueue(
                    pool,
                    source,
                    &discovered.url,
                    discovered.source_listing_id.as_deref(),
                    priority,
                )
                .await?;
                match result {
                    EnqueueResult::Inserted => summary.inserted += 1,
                    EnqueueResult::Requeued => summary.requeued += 1,
                    EnqueueResult::AlreadyQueued => summary.already_queued += 1,
                }
            }
        }

        log.info(&format!(
            "discovered {} urls ({} unique): {} new, {} stale, {} already queued, {} fresh, {} over cap",
            summary.found,
            summary.unique,
            summary.new,
            summary.stale,
            summary.already_queued,
            summary.fresh,
            summary.capped
        ));
        Ok(summary)
    })
    .await
}
