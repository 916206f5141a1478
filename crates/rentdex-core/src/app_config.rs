use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub sources_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub scraper_request_timeout_secs: u64,
    pub scraper_user_agent: String,
    /// Process-wide cap on simultaneous in-flight HTTP requests.
    pub scraper_max_concurrency: usize,
    pub scraper_base_delay_ms: u64,
    pub scraper_jitter_ms: u64,
    pub scraper_max_retries: u32,
    pub scraper_retry_backoff_base_ms: u64,
    /// Start of the UTC night window (inclusive hour, 0-23).
    pub scraper_night_start_hour: u32,
    /// End of the UTC night window (exclusive hour, 0-23). May wrap midnight.
    pub scraper_night_end_hour: u32,
    /// Optional forward proxy. May embed credentials; never log it raw.
    pub proxy_url: Option<String>,
    /// Size of the per-process worker pool used by the process-queue job.
    pub worker_count: usize,
    pub batch_size: usize,
    pub max_pages: usize,
    pub max_urls: usize,
    pub max_items: usize,
    pub rescrape_after_days: i64,
    pub stale_after_days: i64,
    pub khr_per_usd: f64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("sources_path", &self.sources_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "scraper_request_timeout_secs",
                &self.scraper_request_timeout_secs,
            )
            .field("scraper_user_agent", &self.scraper_user_agent)
            .field("scraper_max_concurrency", &self.scraper_max_concurrency)
            .field("scraper_base_delay_ms", &self.scraper_base_delay_ms)
            .field("scraper_jitter_ms", &self.scraper_jitter_ms)
            .field("scraper_max_retries", &self.scraper_max_retries)
            .field(
                "scraper_retry_backoff_base_ms",
                &self.scraper_retry_backoff_base_ms,
            )
            .field("scraper_night_start_hour", &self.scraper_night_start_hour)
            .field("scraper_night_end_hour", &self.scraper_night_end_hour)
            .field("proxy_url", &self.proxy_url.as_ref().map(|_| "[redacted]"))
            .field("worker_count", &self.worker_count)
            .field("batch_size", &self.batch_size)
            .field("max_pages", &self.max_pages)
            .field("max_urls", &self.max_urls)
            .field("max_items", &self.max_items)
            .field("rescrape_after_days", &self.rescrape_after_days)
            .field("stale_after_days", &self.stale_after_days)
            .field("khr_per_usd", &self.khr_per_usd)
            .finish()
    }
}
