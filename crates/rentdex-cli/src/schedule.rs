//! Cron scheduler for the `schedule` command.
//!
//! Registers every pipeline job on a recurring UTC schedule and runs until
//! ctrl-c. Each schedule can be overridden with an env var holding a
//! six-field cron expression (seconds first).

use std::future::Future;
use std::pin::Pin;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::{jobs, App};

const DISCOVER_CRON: &str = "0 0 1 * * *";
const PROCESS_CRON: &str = "0 */30 * * * *";
const STALE_CRON: &str = "0 0 0 * * *";
const DAILY_INDEX_CRON: &str = "0 15 0 * * *";
const MONTHLY_INDEX_CRON: &str = "0 30 0 * * *";

type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// The UTC day the index jobs summarize: yesterday, which is complete.
fn index_date(now: chrono::DateTime<Utc>) -> NaiveDate {
    (now - Duration::days(1)).date_naive()
}

/// Registers one job whose schedule comes from `env_var`, else `default_cron`.
async fn register<F>(
    scheduler: &JobScheduler,
    app: &App,
    name: &'static str,
    env_var: &str,
    default_cron: &str,
    run: F,
) -> anyhow::Result<()>
where
    F: Fn(App) -> JobFuture + Send + Sync + 'static,
{
    let cron = std::env::var(env_var).unwrap_or_else(|_| default_cron.to_string());
    let app = app.clone();

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let app = app.clone();
        let fut = run(app);
        Box::pin(async move {
            tracing::info!(job = name, "scheduler: starting run");
            fut.await;
            tracing::info!(job = name, "scheduler: run complete");
        })
    })
    .map_err(|e| anyhow::anyhow!("invalid cron '{cron}' for {name}: {e}"))?;

    scheduler.add(job).await?;
    tracing::info!(job = name, cron = %cron, "scheduler: registered job");
    Ok(())
}

fn log_failure(name: &str, result: anyhow::Result<()>) {
    if let Err(e) = result {
        tracing::error!(job = name, error = %e, "scheduler: job failed");
    }
}

/// Builds the scheduler, runs it until ctrl-c, then shuts it down.
///
/// # Errors
///
/// Returns an error if a cron expression is invalid or the scheduler cannot
/// be started or stopped.
pub(crate) async fn run(app: App) -> anyhow::Result<()> {
    let mut scheduler = JobScheduler::new().await?;

    register(&scheduler, &app, "discover", "RENTDEX_DISCOVER_CRON", DISCOVER_CRON, |app| {
        Box::pin(async move {
            log_failure("discover", jobs::run_discover(&app, None, None).await);
        })
    })
    .await?;

    register(&scheduler, &app, "process_queue", "RENTDEX_PROCESS_CRON", PROCESS_CRON, |app| {
        Box::pin(async move {
            log_failure("process_queue", jobs::run_process(&app, None, None).await);
        })
    })
    .await?;

    register(&scheduler, &app, "mark_stale", "RENTDEX_STALE_CRON", STALE_CRON, |app| {
        Box::pin(async move {
            let days = app.config.stale_after_days;
            log_failure("mark_stale", jobs::run_mark_stale(&app.pool, days).await);
        })
    })
    .await?;

    register(
        &scheduler,
        &app,
        "build_daily_index",
        "RENTDEX_DAILY_INDEX_CRON",
        DAILY_INDEX_CRON,
        |app| {
            Box::pin(async move {
                let date = index_date(Utc::now());
                log_failure(
                    "build_daily_index",
                    jobs::run_daily_index(&app.pool, date).await,
                );
            })
        },
    )
    .await?;

    // Refreshes the month containing yesterday, so the first run of a month
    // finalizes the previous one.
    register(
        &scheduler,
        &app,
        "build_monthly_index",
        "RENTDEX_MONTHLY_INDEX_CRON",
        MONTHLY_INDEX_CRON,
        |app| {
            Box::pin(async move {
                let date = index_date(Utc::now());
                log_failure(
                    "build_monthly_index",
                    jobs::run_monthly_index(&app.pool, date.year(), date.month()).await,
                );
            })
        },
    )
    .await?;

    scheduler.start().await?;
    tracing::info!("scheduler: running; press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("scheduler: shutting down");
    scheduler.shutdown().await?;
    Ok(())
}
