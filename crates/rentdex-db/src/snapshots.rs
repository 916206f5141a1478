//! Database operations for `rental_snapshots`.

use chrono::{DateTime, Utc};
use rentdex_core::PropertyType;
use sqlx::PgPool;

use crate::DbError;

/// One observation of a listing, appended after every successful scrape.
#[derive(Debug, Clone)]
pub struct SnapshotWrite {
    pub listing_id: i64,
    pub city: Option<String>,
    pub district: Option<String>,
    pub bedrooms: Option<i32>,
    pub property_type: PropertyType,
    pub price: Option<f64>,
    pub posted_at: Option<DateTime<Utc>>,
    pub scraped_at: DateTime<Utc>,
}

/// The fields the index builder groups and aggregates on.
///
/// `price` is read back as `float8`; statistics run on `f64`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SnapshotPriceRow {
    pub listing_id: i64,
    pub city: Option<String>,
    pub district: Option<String>,
    pub bedrooms: Option<i32>,
    pub property_type: String,
    pub price: f64,
    pub scraped_at: DateTime<Utc>,
}

/// Appends a snapshot. Returns its `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_snapshot(pool: &PgPool, snapshot: &SnapshotWrite) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO rental_snapshots \
             (listing_id, city, district, bedrooms, property_type, price, posted_at, scraped_at) \
         VALUES ($1, $2, $3, $4, $5, $6::numeric(12,2), $7, $8) \
         RETURNING id",
    )
    .bind(snapshot.listing_id)
    .bind(&snapshot.city)
    .bind(&snapshot.district)
    .bind(snapshot.bedrooms)
    .bind(snapshot.property_type.as_str())
    .bind(snapshot.price)
    .bind(snapshot.posted_at)
    .bind(snapshot.scraped_at)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Priced snapshots scraped in `[from, to)`, keeping only the latest
/// snapshot per listing so a listing scraped twice in the window counts once.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn snapshots_for_window(
    pool: &PgPool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<SnapshotPriceRow>, DbError> {
    let rows = sqlx::query_as::<_, SnapshotPriceRow>(
        "SELECT DISTINCT ON (listing_id) \
                listing_id, city, district, bedrooms, property_type, \
                price::float8 AS price, scraped_at \
         FROM rental_snapshots \
         WHERE scraped_at >= $1 AND scraped_at < $2 AND price IS NOT NULL \
         ORDER BY listing_id, scraped_at DESC, id DESC",
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Number of snapshots stored for a listing.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_snapshots(pool: &PgPool, listing_id: i64) -> Result<i64, DbError> {
    let n = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM rental_snapshots WHERE listing_id = $1",
    )
    .bind(listing_id)
    .fetch_one(pool)
    .await?;
    Ok(n)
}
