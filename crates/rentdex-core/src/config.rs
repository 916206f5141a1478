use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Parsing is decoupled from the process environment so it can be tested
/// with a plain `HashMap` lookup.
pub(crate) fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_num = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let value = parse_num(var, default)?;
        u32::try_from(value).map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let value = parse_num(var, default)?;
        usize::try_from(value).map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_days = |var: &str, default: &str| -> Result<i64, ConfigError> {
        let value = parse_num(var, default)?;
        i64::try_from(value).map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_hour = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let hour = parse_u32(var, default)?;
        if hour > 23 {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("hour {hour} is outside 0-23"),
            });
        }
        Ok(hour)
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("RENTDEX_ENV", "development"))?;
    let log_level = or_default("RENTDEX_LOG_LEVEL", "info");
    let sources_path = PathBuf::from(or_default("RENTDEX_SOURCES_PATH", "./config/sources.yaml"));

    let db_max_connections = parse_u32("RENTDEX_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("RENTDEX_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_num("RENTDEX_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let scraper_request_timeout_secs = parse_num("RENTDEX_SCRAPER_REQUEST_TIMEOUT_SECS", "30")?;
    let scraper_user_agent = or_default(
        "RENTDEX_SCRAPER_USER_AGENT",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    );
    let scraper_max_concurrency = parse_usize("RENTDEX_SCRAPER_MAX_CONCURRENCY", "3")?;
    if scraper_max_concurrency == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "RENTDEX_SCRAPER_MAX_CONCURRENCY".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let scraper_base_delay_ms = parse_num("RENTDEX_SCRAPER_BASE_DELAY_MS", "2500")?;
    let scraper_jitter_ms = parse_num("RENTDEX_SCRAPER_JITTER_MS", "2000")?;
    let scraper_max_retries = parse_u32("RENTDEX_SCRAPER_MAX_RETRIES", "3")?;
    let scraper_retry_backoff_base_ms = parse_num("RENTDEX_SCRAPER_RETRY_BACKOFF_BASE_MS", "1000")?;
    let scraper_night_start_hour = parse_hour("RENTDEX_SCRAPER_NIGHT_START_HOUR", "17")?;
    let scraper_night_end_hour = parse_hour("RENTDEX_SCRAPER_NIGHT_END_HOUR", "23")?;
    let proxy_url = lookup("RENTDEX_PROXY_URL")
        .ok()
        .filter(|v| !v.trim().is_empty());

    let worker_count = parse_usize("RENTDEX_WORKER_COUNT", "3")?.max(1);
    let batch_size = parse_usize("RENTDEX_BATCH_SIZE", "10")?.max(1);
    let max_pages = parse_usize("RENTDEX_MAX_PAGES", "5")?;
    let max_urls = parse_usize("RENTDEX_MAX_URLS", "500")?;
    let max_items = parse_usize("RENTDEX_MAX_ITEMS", "200")?;
    let rescrape_after_days = parse_days("RENTDEX_RESCRAPE_AFTER_DAYS", "3")?;
    let stale_after_days = parse_days("RENTDEX_STALE_AFTER_DAYS", "7")?;

    let khr_raw = or_default("RENTDEX_KHR_PER_USD", "4100");
    let khr_per_usd = khr_raw
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or_else(|| ConfigError::InvalidEnvVar {
            var: "RENTDEX_KHR_PER_USD".to_string(),
            reason: format!("expected a positive number, got {khr_raw:?}"),
        })?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        sources_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        scraper_request_timeout_secs,
        scraper_user_agent,
        scraper_max_concurrency,
        scraper_base_delay_ms,
        scraper_jitter_ms,
        scraper_max_retries,
        scraper_retry_backoff_base_ms,
        scraper_night_start_hour,
        scraper_night_end_hour,
        proxy_url,
        worker_count,
        batch_size,
        max_pages,
        max_urls,
        max_items,
        rescrape_after_days,
        stale_after_days,
        khr_per_usd,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "RENTDEX_ENV".to_string(),
            reason: format!("unknown environment {other:?}"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
