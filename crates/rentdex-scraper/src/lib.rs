pub mod adapter;
pub mod canonical;
pub mod classify;
pub mod client;
pub mod error;
pub mod fingerprint;
pub mod generic;
pub mod jsonld;
pub mod pacing;
pub mod progress;
pub(crate) mod rate_limit;

pub use adapter::{AdapterRegistry, DiscoveredUrl, SourceAdapter};
pub use canonical::canonicalize_url;
pub use classify::{classify, classify_with_hint, Classification};
pub use client::{redact_proxy_url, FetchClient, FetchClientOptions, RequestLimiter};
pub use error::ScraperError;
pub use fingerprint::fingerprint;
pub use generic::GenericAdapter;
pub use pacing::PacingConfig;
pub use progress::{JobLogger, LogLevel, NoopLogger, TracingLogger};
