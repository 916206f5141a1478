//! Ingestion jobs: discovery, queue processing, stale marking and the
//! rental price index.
//!
//! Every job records one `job_runs` row through [`job_run::run_tracked`]
//! and returns a serializable summary that doubles as the row's `counts`.

pub mod discover;
pub mod index;
pub mod job_run;
pub mod lifecycle;
pub mod process_queue;
pub mod shutdown;
pub mod stale;
pub mod stats;

pub use discover::{discover, DiscoverOptions, DiscoverSummary};
pub use index::{build_daily_index, build_monthly_index, DailyIndexSummary, MonthlyIndexSummary};
pub use lifecycle::{plan_listing, ListingPlan};
pub use process_queue::{process_queue, ProcessOptions, ProcessSummary};
pub use shutdown::Shutdown;
pub use stale::{mark_stale, StaleSummary};
pub use stats::{percentile, summarize, PriceStats};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid month: {year}-{month:02}")]
    InvalidMonth { year: i32, month: u32 },

    #[error("stale threshold must be at least one day, got {0}")]
    InvalidThreshold(i64),

    #[error(transparent)]
    Db(#[from] rentdex_db::DbError),

    #[error(transparent)]
    Scraper(#[from] rentdex_scraper::ScraperError),
}
