//! Offline unit tests for rentdex-db pool configuration and row types.
//! These tests do not require a live database connection.

use rentdex_core::{AppConfig, Environment, PropertyType, QueueStatus};
use rentdex_db::{
    CompletionOutcome, DbError, JobRunRow, ListingRow, PoolConfig, QueueCounts, QueueItemRow,
};
use std::path::PathBuf;

fn app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        log_level: "info".to_string(),
        sources_path: PathBuf::from("./config/sources.yaml"),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        scraper_request_timeout_secs: 30,
        scraper_user_agent: "ua".to_string(),
        scraper_max_concurrency: 2,
        scraper_base_delay_ms: 0,
        scraper_jitter_ms: 0,
        scraper_max_retries: 3,
        scraper_retry_backoff_base_ms: 500,
        scraper_night_start_hour: 17,
        scraper_night_end_hour: 23,
        proxy_url: None,
        worker_count: 2,
        batch_size: 20,
        max_pages: 5,
        max_urls: 500,
        max_items: 200,
        rescrape_after_days: 3,
        stale_after_days: 7,
        khr_per_usd: 4100.0,
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[tokio::test]
async fn connect_pool_rejects_empty_url() {
    let err = rentdex_db::connect_pool("  ", PoolConfig::default())
        .await
        .expect_err("empty URL must be rejected");
    assert!(matches!(err, DbError::MissingDatabaseUrl));
}

fn queue_row(status: &str) -> QueueItemRow {
    use chrono::Utc;

    QueueItemRow {
        id: 1,
        source: "realestate-kh".to_string(),
        canonical_url: "https://www.realestate.com.kh/rent/123".to_string(),
        source_listing_id: Some("123".to_string()),
        status: status.to_string(),
        attempts: 0,
        priority: 1,
        last_error: None,
        claim_token: None,
        claimed_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn queue_item_row_parses_known_status() {
    let row = queue_row("retry");
    assert_eq!(
        row.queue_status().expect("retry is a valid status"),
        QueueStatus::Retry
    );
}

#[test]
fn queue_item_row_rejects_unknown_status() {
    let row = queue_row("exploded");
    let err = row.queue_status().expect_err("unknown status must not parse");
    assert!(matches!(
        err,
        DbError::InvalidValue { value, .. } if value == "exploded"
    ));
}

#[test]
fn queue_counts_total_sums_every_state() {
    let counts = QueueCounts {
        pending: 4,
        processing: 1,
        retry: 2,
        done: 10,
    };
    assert_eq!(counts.total(), 17);
}

#[test]
fn completion_outcome_carries_its_message() {
    let outcome = CompletionOutcome::Filtered {
        reason: "no usable price".to_string(),
    };
    assert!(matches!(
        outcome,
        CompletionOutcome::Filtered { ref reason } if reason == "no usable price"
    ));
}

/// Compile-time smoke test: confirm that [`ListingRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn listing_row_has_expected_fields() {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    let row = ListingRow {
        id: 7,
        public_id: Uuid::new_v4(),
        source: "khmer24".to_string(),
        source_listing_id: None,
        canonical_url: "https://www.khmer24.com/en/condo-for-rent-adid-1.html".to_string(),
        title: "2BR condo in BKK1".to_string(),
        description: None,
        city: Some("Phnom Penh".to_string()),
        district: Some("Chamkar Mon".to_string()),
        latitude: None,
        longitude: None,
        property_type: "CONDO".to_string(),
        bedrooms: Some(2),
        bathrooms: Some(2),
        size_sqm: Some(Decimal::new(8550, 2)),
        price_original: Some(Decimal::new(850, 0)),
        price_monthly_usd: Some(Decimal::new(850, 0)),
        currency: Some("USD".to_string()),
        image_urls: vec![],
        amenities: vec!["pool".to_string()],
        posted_at: None,
        first_seen_at: Utc::now(),
        last_seen_at: Utc::now(),
        is_active: true,
        manual_override: false,
        content_fingerprint: Some("ab".repeat(32)),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    assert_eq!(
        row.parsed_property_type().expect("condo parses"),
        PropertyType::Condo
    );
    assert_eq!(row.size_sqm, Some(Decimal::new(8550, 2)));
    assert!(!row.manual_override);
}

#[test]
fn job_run_row_has_expected_fields() {
    use chrono::Utc;
    use uuid::Uuid;

    let row = JobRunRow {
        id: 1,
        public_id: Uuid::new_v4(),
        job_type: "discover".to_string(),
        source: Some("khmer24".to_string()),
        status: "running".to_string(),
        started_at: Utc::now(),
        ended_at: None,
        counts: serde_json::json!({}),
        error_message: None,
    };

    assert_eq!(row.job_type, "discover");
    assert!(row.ended_at.is_none());
    assert_eq!(row.counts, serde_json::json!({}));
}
