mod admin;
mod jobs;
mod schedule;

use std::sync::Arc;

use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand};
use rentdex_core::{AppConfig, JobType, PropertyType};
use rentdex_pipeline::Shutdown;
use rentdex_scraper::{AdapterRegistry, FetchClient, GenericAdapter, RequestLimiter, SourceAdapter};
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rentdex-cli")]
#[command(about = "Rental listing ingestion and price index engine")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database utilities
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Crawl index pages and enqueue listing URLs
    Discover {
        /// Only this source (defaults to every enabled source)
        #[arg(long)]
        source: Option<String>,
        /// Override `RENTDEX_MAX_URLS`
        #[arg(long)]
        max_urls: Option<usize>,
    },
    /// Claim queued URLs, scrape them and store listings
    Process {
        /// Only this source (defaults to every enabled source)
        #[arg(long)]
        source: Option<String>,
        /// Override `RENTDEX_MAX_ITEMS`
        #[arg(long)]
        max_items: Option<usize>,
    },
    /// Deactivate listings not seen recently
    MarkStale {
        /// Override `RENTDEX_STALE_AFTER_DAYS`
        #[arg(long)]
        days: Option<i64>,
    },
    /// Build or show the rental price index
    Index {
        #[command(subcommand)]
        command: IndexCommands,
    },
    /// Inspect the scrape queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Inspect job run history
    Runs {
        #[command(subcommand)]
        command: RunsCommands,
    },
    /// Manually correct a stored listing
    Listing {
        #[command(subcommand)]
        command: ListingCommands,
    },
    /// Run every job on its cron schedule until interrupted
    Schedule,
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[derive(Debug, Subcommand)]
enum IndexCommands {
    /// Rebuild the daily index for one UTC date
    Daily {
        /// Date to rebuild, e.g. 2025-03-10 (defaults to today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Rebuild the monthly index from its daily rows
    Monthly {
        /// Defaults to the current UTC year
        #[arg(long)]
        year: Option<i32>,
        /// Defaults to the current UTC month
        #[arg(long)]
        month: Option<u32>,
    },
    /// Print the stored daily index for one date
    ShowDaily {
        #[arg(long)]
        date: NaiveDate,
    },
    /// Print the stored monthly index for one month
    ShowMonthly {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
    },
}

#[derive(Debug, Subcommand)]
enum QueueCommands {
    /// Show item counts per status
    Status {
        /// Filter by source
        #[arg(long)]
        source: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum RunsCommands {
    /// List recent job runs, newest first
    List {
        /// Filter by job type (e.g. `process_queue`)
        #[arg(long)]
        job: Option<JobType>,
        /// Maximum number of runs to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Debug, Subcommand)]
enum ListingCommands {
    /// Pin a listing so scraping cannot change its type or re-activate it
    Override {
        #[arg(long)]
        id: i64,
        /// Corrected property type (e.g. `CONDO`)
        #[arg(long)]
        property_type: Option<PropertyType>,
        /// Force the active flag
        #[arg(long)]
        active: Option<bool>,
    },
    /// Return a listing to automated control
    ClearOverride {
        #[arg(long)]
        id: i64,
    },
}

/// Everything a job handler needs, shared by one-shot commands and the
/// scheduler.
#[derive(Clone)]
pub(crate) struct App {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub registry: AdapterRegistry,
    pub limiter: Arc<RequestLimiter>,
    pub shutdown: Shutdown,
}

impl App {
    /// Adapters to run: the named source, or every enabled one.
    pub(crate) fn adapters(
        &self,
        source: Option<&str>,
    ) -> anyhow::Result<Vec<Arc<dyn SourceAdapter>>> {
        match source {
            Some(name) => {
                let adapter = self.registry.get(name).ok_or_else(|| {
                    anyhow::anyhow!("source '{name}' is not configured or is disabled")
                })?;
                Ok(vec![adapter])
            }
            None => {
                if self.registry.is_empty() {
                    anyhow::bail!(
                        "no enabled sources in {}",
                        self.config.sources_path.display()
                    );
                }
                Ok(self
                    .registry
                    .names()
                    .filter_map(|name| self.registry.get(name))
                    .collect())
            }
        }
    }
}

/// Registers a [`GenericAdapter`] for every enabled source. All adapters
/// share one fetch client, so one limiter bounds the whole process.
fn build_registry(config: &AppConfig) -> anyhow::Result<(AdapterRegistry, Arc<RequestLimiter>)> {
    let sources = rentdex_core::load_sources(&config.sources_path)
        .with_context(|| format!("loading {}", config.sources_path.display()))?;
    let client = FetchClient::from_app_config(config).context("building fetch client")?;
    let limiter = Arc::clone(client.limiter());

    let mut registry = AdapterRegistry::new();
    for source in sources.sources {
        if !source.is_enabled() {
            tracing::info!(source = %source.name, "source disabled; skipping");
            continue;
        }
        let name = source.name.clone();
        let adapter = GenericAdapter::new(source, client.clone(), config.max_pages)
            .with_context(|| format!("configuring source '{name}'"))?;
        registry.register(Arc::new(adapter));
    }
    tracing::info!(sources = registry.len(), "adapters registered");
    Ok((registry, limiter))
}

fn spawn_ctrl_c_handler(shutdown: Shutdown) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("ctrl-c received; finishing the current batch");
                shutdown.trigger();
            }
            Err(e) => tracing::error!(error = %e, "failed to listen for ctrl-c"),
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("rentdex-cli: no command given; see --help");
        return Ok(());
    };

    let config = Arc::new(rentdex_core::load_app_config().context("loading configuration")?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::debug!(?config, "configuration loaded");

    let pool_config = rentdex_db::PoolConfig::from_app_config(&config);
    let pool = rentdex_db::connect_pool(&config.database_url, pool_config)
        .await
        .context("connecting to database")?;

    match command {
        Commands::Db { command } => run_db(&pool, command).await,
        Commands::Discover { source, max_urls } => {
            let app = build_app(pool, config)?;
            jobs::run_discover(&app, source.as_deref(), max_urls).await
        }
        Commands::Process { source, max_items } => {
            let app = build_app(pool, config)?;
            jobs::run_process(&app, source.as_deref(), max_items).await
        }
        Commands::MarkStale { days } => {
            jobs::run_mark_stale(&pool, days.unwrap_or(config.stale_after_days)).await
        }
        Commands::Index { command } => run_index(&pool, command).await,
        Commands::Queue {
            command: QueueCommands::Status { source },
        } => admin::queue_status(&pool, source.as_deref()).await,
        Commands::Runs {
            command: RunsCommands::List { job, limit },
        } => admin::list_runs(&pool, job, limit).await,
        Commands::Listing { command } => run_listing(&pool, command).await,
        Commands::Schedule => schedule::run(build_app(pool, config)?).await,
    }
}

/// Loads the sources and wires ctrl-c to the shared shutdown flag.
fn build_app(pool: PgPool, config: Arc<AppConfig>) -> anyhow::Result<App> {
    let (registry, limiter) = build_registry(&config)?;
    let shutdown = Shutdown::new();
    spawn_ctrl_c_handler(shutdown.clone());
    Ok(App {
        pool,
        config,
        registry,
        limiter,
        shutdown,
    })
}

async fn run_db(pool: &PgPool, command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Ping => {
            rentdex_db::ping(pool).await.context("database ping failed")?;
            println!("database: ok");
        }
        DbCommands::Migrate => {
            let applied = rentdex_db::run_migrations(pool)
                .await
                .context("running migrations")?;
            println!("migrations applied: {applied}");
        }
    }
    Ok(())
}

async fn run_index(pool: &PgPool, command: IndexCommands) -> anyhow::Result<()> {
    match command {
        IndexCommands::Daily { date } => {
            let date = date.unwrap_or_else(|| chrono::Utc::now().date_naive());
            jobs::run_daily_index(pool, date).await
        }
        IndexCommands::Monthly { year, month } => {
            let today = chrono::Utc::now().date_naive();
            jobs::run_monthly_index(
                pool,
                year.unwrap_or_else(|| today.year()),
                month.unwrap_or_else(|| today.month()),
            )
            .await
        }
        IndexCommands::ShowDaily { date } => admin::show_daily_index(pool, date).await,
        IndexCommands::ShowMonthly { year, month } => {
            admin::show_monthly_index(pool, year, month).await
        }
    }
}

async fn run_listing(pool: &PgPool, command: ListingCommands) -> anyhow::Result<()> {
    match command {
        ListingCommands::Override {
            id,
            property_type,
            active,
        } => admin::set_override(pool, id, property_type, active).await,
        ListingCommands::ClearOverride { id } => admin::clear_override(pool, id).await,
    }
}

#[cfg(test)]
mod tests;
