//! Job command handlers for the CLI.
//!
//! Each handler runs one pipeline job (per source where applicable) and
//! prints its summary as a JSON line. A failing source is logged and the
//! remaining sources still run; the command fails afterwards if any did.

use chrono::NaiveDate;
use rentdex_pipeline::{DiscoverOptions, ProcessOptions};
use rentdex_scraper::TracingLogger;
use serde::Serialize;
use sqlx::PgPool;

use crate::App;

fn print_summary<T: Serialize>(job: &str, summary: &T) {
    match serde_json::to_string(summary) {
        Ok(json) => println!("{job}: {json}"),
        Err(e) => tracing::warn!(job, error = %e, "failed to serialize job summary"),
    }
}

fn finish(job: &str, failed: &[String]) -> anyhow::Result<()> {
    if failed.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{job} failed for: {}", failed.join(", "))
    }
}

/// Runs the discover job for one source or every enabled source.
///
/// # Errors
///
/// Returns an error if the source is unknown or any source's job failed.
pub(crate) async fn run_discover(
    app: &App,
    source: Option<&str>,
    max_urls: Option<usize>,
) -> anyhow::Result<()> {
    let defaults = DiscoverOptions::from_app_config(&app.config);
    let options = DiscoverOptions {
        max_urls: max_urls.unwrap_or(defaults.max_urls),
        ..defaults
    };

    let mut failed = Vec::new();
    for adapter in app.adapters(source)? {
        let name = adapter.name();
        let log = TracingLogger::new("discover", Some(name));
        match rentdex_pipeline::discover(&app.pool, adapter.as_ref(), options, &log).await {
            Ok(summary) => print_summary("discover", &summary),
            Err(e) => {
                tracing::error!(source = name, error = %e, "discover failed");
                failed.push(name.to_owned());
            }
        }
    }
    finish("discover", &failed)
}

/// Runs the process-queue job for one source or every enabled source.
/// Stops between sources once shutdown has been requested.
///
/// # Errors
///
/// Returns an error if the source is unknown or any source's job failed.
pub(crate) async fn run_process(
    app: &App,
    source: Option<&str>,
    max_items: Option<usize>,
) -> anyhow::Result<()> {
    let defaults = ProcessOptions::from_app_config(&app.config);
    let options = ProcessOptions {
        max_items: max_items.unwrap_or(defaults.max_items),
        ..defaults
    };

    let mut failed = Vec::new();
    for adapter in app.adapters(source)? {
        if app.shutdown.is_triggered() {
            tracing::warn!("shutdown requested; skipping remaining sources");
            break;
        }
        let name = adapter.name();
        let log = TracingLogger::new("process_queue", Some(name));
        match rentdex_pipeline::process_queue(
            &app.pool,
            adapter.as_ref(),
            &app.limiter,
            options,
            &app.shutdown,
            &log,
        )
        .await
        {
            Ok(summary) => print_summary("process", &summary),
            Err(e) => {
                tracing::error!(source = name, error = %e, "process_queue failed");
                failed.push(name.to_owned());
            }
        }
    }
    finish("process", &failed)
}

/// # Errors
///
/// Returns an error for a threshold below one day or if the sweep fails.
pub(crate) async fn run_mark_stale(pool: &PgPool, days: i64) -> anyhow::Result<()> {
    let summary = rentdex_pipeline::mark_stale(pool, days).await?;
    print_summary("mark-stale", &summary);
    Ok(())
}

/// # Errors
///
/// Returns an error if the daily index cannot be rebuilt.
pub(crate) async fn run_daily_index(pool: &PgPool, date: NaiveDate) -> anyhow::Result<()> {
    let summary = rentdex_pipeline::build_daily_index(pool, date).await?;
    print_summary("index daily", &summary);
    Ok(())
}

/// # Errors
///
/// Returns an error for an impossible month or if the rebuild fails.
pub(crate) async fn run_monthly_index(pool: &PgPool, year: i32, month: u32) -> anyhow::Result<()> {
    let summary = rentdex_pipeline::build_monthly_index(pool, year, month).await?;
    print_summary("index monthly", &summary);
    Ok(())
}
