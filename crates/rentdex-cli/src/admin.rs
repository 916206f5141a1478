//! Read-only inspection and manual-override commands.

use chrono::NaiveDate;
use rentdex_core::{JobType, PropertyType};
use rentdex_db::DailyIndexRow;
use sqlx::PgPool;

/// Format an optional cell for display, returning `"-"` when `None`.
fn cell<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub(crate) async fn queue_status(pool: &PgPool, source: Option<&str>) -> anyhow::Result<()> {
    let counts = rentdex_db::queue_counts(pool, source).await?;
    println!("queue ({})", source.unwrap_or("all sources"));
    println!("  pending:    {}", counts.pending);
    println!("  retry:      {}", counts.retry);
    println!("  processing: {}", counts.processing);
    println!("  done:       {}", counts.done);
    println!("  total:      {}", counts.total());
    Ok(())
}

pub(crate) async fn list_runs(
    pool: &PgPool,
    job: Option<JobType>,
    limit: i64,
) -> anyhow::Result<()> {
    let runs = rentdex_db::list_job_runs(pool, job, limit).await?;
    if runs.is_empty() {
        println!("no job runs recorded");
        return Ok(());
    }
    for run in runs {
        println!(
            "{}  {:<19}  {:<14}  {:<9}  {}  {}  {}{}",
            run.public_id,
            run.job_type,
            cell(run.source.as_deref()),
            run.status,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            cell(run.ended_at.map(|t| t.format("%H:%M:%S"))),
            run.counts,
            run.error_message
                .map(|m| format!("  error: {m}"))
                .unwrap_or_default(),
        );
    }
    Ok(())
}

fn print_index(label: &str, rows: &[DailyIndexRow]) {
    if rows.is_empty() {
        println!("{label}: no index rows");
        return;
    }
    println!("{label}: {} groups", rows.len());
    for row in rows {
        println!(
            "  {:<14} {:<16} {:>3}br {:<18} n={:<4} median={} mean={} p25={} p75={}",
            cell(row.city.as_deref()),
            cell(row.district.as_deref()),
            cell(row.bedrooms),
            row.property_type,
            row.listing_count,
            row.median_price,
            row.mean_price,
            row.p25_price,
            row.p75_price,
        );
    }
}

pub(crate) async fn show_daily_index(pool: &PgPool, date: NaiveDate) -> anyhow::Result<()> {
    let rows = rentdex_db::list_daily_index(pool, date).await?;
    print_index(&format!("daily index {date}"), &rows);
    Ok(())
}

pub(crate) async fn show_monthly_index(pool: &PgPool, year: i32, month: u32) -> anyhow::Result<()> {
    let month_start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| anyhow::anyhow!("invalid month {year}-{month:02}"))?;
    let rows = rentdex_db::list_monthly_index(pool, month_start).await?;
    print_index(&format!("monthly index {}", month_start.format("%Y-%m")), &rows);
    Ok(())
}

pub(crate) async fn set_override(
    pool: &PgPool,
    id: i64,
    property_type: Option<PropertyType>,
    active: Option<bool>,
) -> anyhow::Result<()> {
    let row = rentdex_db::set_manual_override(pool, id, property_type, active).await?;
    tracing::info!(listing_id = id, "manual override set");
    println!(
        "listing {} pinned: type={} active={} url={}",
        row.id, row.property_type, row.is_active, row.canonical_url
    );
    Ok(())
}

pub(crate) async fn clear_override(pool: &PgPool, id: i64) -> anyhow::Result<()> {
    rentdex_db::clear_manual_override(pool, id).await?;
    tracing::info!(listing_id = id, "manual override cleared");
    println!("listing {id} returned to automated control");
    Ok(())
}
