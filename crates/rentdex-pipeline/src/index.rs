//! Daily and monthly rental price index builders.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use rentdex_core::JobType;
use rentdex_db::{IndexGroupStats, SnapshotPriceRow};
use serde::Serialize;
use sqlx::PgPool;

use crate::job_run::run_tracked;
use crate::stats::summarize;
use crate::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyIndexSummary {
    pub date: NaiveDate,
    pub listings: usize,
    pub groups: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyIndexSummary {
    pub month: NaiveDate,
    pub groups: u64,
}

type GroupKey = (Option<String>, Option<String>, Option<i32>, String);

/// Groups the latest priced snapshot of each listing by
/// `(city, district, bedrooms, property_type)` and computes the statistics
/// for every group. Output is ordered by group key.
#[must_use]
pub fn group_stats(rows: &[SnapshotPriceRow]) -> Vec<IndexGroupStats> {
    let mut groups: BTreeMap<GroupKey, Vec<f64>> = BTreeMap::new();
    for row in rows {
        groups
            .entry((
                row.city.clone(),
                row.district.clone(),
                row.bedrooms,
                row.property_type.clone(),
            ))
            .or_default()
            .push(row.price);
    }

    groups
        .into_iter()
        .filter_map(|((city, district, bedrooms, property_type), prices)| {
            let stats = summarize(&prices)?;
            Some(IndexGroupStats {
                city,
                district,
                bedrooms,
                property_type,
                listing_count: i32::try_from(stats.count).unwrap_or(i32::MAX),
                median_price: stats.median,
                mean_price: stats.mean,
                p25_price: stats.p25,
                p75_price: stats.p75,
            })
        })
        .collect()
}

/// Rebuilds the index rows for `date` from the snapshots scraped that UTC
/// day. Running it twice for the same date yields the same rows.
///
/// A listing scraped more than once that day contributes only its latest
/// snapshot, so every listing counts once per group rather than once per
/// scrape.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] if reading snapshots or writing the index
/// fails.
pub async fn build_daily_index(
    pool: &PgPool,
    date: NaiveDate,
) -> Result<DailyIndexSummary, PipelineError> {
    run_tracked(pool, JobType::BuildDailyIndex, None, || async move {
        let from = date.and_time(NaiveTime::MIN).and_utc();
        let to = from + chrono::Duration::days(1);
        let rows = rentdex_db::snapshots_for_window(pool, from, to).await?;
        let groups = group_stats(&rows);
        let written = rentdex_db::replace_daily_index(pool, date, &groups).await?;

        tracing::info!(%date, listings = rows.len(), groups = written, "daily index rebuilt");
        Ok(DailyIndexSummary {
            date,
            listings: rows.len(),
            groups: written,
        })
    })
    .await
}

/// Rebuilds the monthly index for `year`-`month` from its daily rows.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidMonth`] for an impossible month, or
/// [`PipelineError::Db`] if the rebuild fails.
pub async fn build_monthly_index(
    pool: &PgPool,
    year: i32,
    month: u32,
) -> Result<MonthlyIndexSummary, PipelineError> {
    let month_start = month_start(year, month)?;
    run_tracked(pool, JobType::BuildMonthlyIndex, None, || async move {
        let written = rentdex_db::rebuild_monthly_index(pool, month_start).await?;
        tracing::info!(month = %month_start, groups = written, "monthly index rebuilt");
        Ok(MonthlyIndexSummary {
            month: month_start,
            groups: written,
        })
    })
    .await
}

fn month_start(year: i32, month: u32) -> Result<NaiveDate, PipelineError> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or(PipelineError::InvalidMonth { year, month })
}
