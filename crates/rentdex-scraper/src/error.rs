use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by {domain} (retry after {retry_after_secs}s)")]
    RateLimited {
        domain: String,
        retry_after_secs: u64,
    },

    #[error("page not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("unreadable response body from {url}: {reason}")]
    Body { url: String, reason: String },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid proxy configuration: {reason}")]
    InvalidProxy { reason: String },

    #[error("invalid pattern for source {source_name}: {reason}")]
    InvalidPattern { source_name: String, reason: String },

    #[error("adapter {source_name} failed: {reason}")]
    Adapter { source_name: String, reason: String },
}
