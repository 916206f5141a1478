pub mod app_config;
pub mod config;
pub mod listings;
pub mod location;
pub mod pricing;
pub mod sources;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use listings::{
    JobStatus, JobType, PropertyType, QueueStatus, ScrapedListing, MAX_QUEUE_ATTEMPTS,
};
pub use location::{resolve_location, Location};
pub use pricing::{normalize_monthly_usd, Currency, MAX_MONTHLY_USD, MIN_MONTHLY_USD};
pub use sources::{load_sources, SourceConfig, SourcesFile};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read sources file {path}: {source}")]
    SourcesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sources file: {0}")]
    SourcesFileParse(#[from] serde_yaml::Error),

    #[error("invalid sources configuration: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown property type: {0}")]
    UnknownPropertyType(String),

    #[error("unknown queue status: {0}")]
    UnknownQueueStatus(String),

    #[error("unknown job type: {0}")]
    UnknownJobType(String),
}
