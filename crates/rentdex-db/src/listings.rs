//! Database operations for `rental_listings`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rentdex_core::PropertyType;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `rental_listings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ListingRow {
    pub id: i64,
    pub public_id: Uuid,
    pub source: String,
    pub source_listing_id: Option<String>,
    pub canonical_url: String,
    pub title: String,
    pub description: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub property_type: String,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub size_sqm: Option<Decimal>,
    pub price_original: Option<Decimal>,
    pub price_monthly_usd: Option<Decimal>,
    pub currency: Option<String>,
    pub image_urls: Vec<String>,
    pub amenities: Vec<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub is_active: bool,
    /// While set, scraping never changes `property_type` or `is_active`.
    pub manual_override: bool,
    pub content_fingerprint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ListingRow {
    /// Parsed `property_type`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidValue`] for a value outside the schema's
    /// CHECK constraint.
    pub fn parsed_property_type(&self) -> Result<PropertyType, DbError> {
        self.property_type
            .parse()
            .map_err(|_| DbError::InvalidValue {
                column: "rental_listings.property_type",
                value: self.property_type.clone(),
            })
    }
}

/// Scraped fields written on insert and update.
///
/// Numeric fields are bound as `f64` and cast to `NUMERIC` inside the SQL
/// statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingWrite {
    pub source: String,
    pub source_listing_id: Option<String>,
    pub canonical_url: String,
    pub title: String,
    pub description: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub property_type: PropertyType,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub size_sqm: Option<f64>,
    pub price_original: Option<f64>,
    pub price_monthly_usd: Option<f64>,
    pub currency: Option<String>,
    pub image_urls: Vec<String>,
    pub amenities: Vec<String>,
    pub posted_at: Option<DateTime<Utc>>,
    /// Whether the listing should be active after this write. Ignored for
    /// rows under manual override.
    pub is_active: bool,
    pub content_fingerprint: Option<String>,
}

const LISTING_COLUMNS: &str = "id, public_id, source, source_listing_id, canonical_url, title, \
     description, city, district, latitude, longitude, property_type, bedrooms, bathrooms, \
     size_sqm, price_original, price_monthly_usd, currency, image_urls, amenities, posted_at, \
     first_seen_at, last_seen_at, is_active, manual_override, content_fingerprint, \
     created_at, updated_at";

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

async fn fetch_one_where(
    pool: &PgPool,
    predicate: &str,
    binds: &[&str],
) -> Result<Option<ListingRow>, DbError> {
    let sql = format!("SELECT {LISTING_COLUMNS} FROM rental_listings WHERE {predicate} LIMIT 1");
    let mut query = sqlx::query_as::<_, ListingRow>(&sql);
    for bind in binds {
        query = query.bind(*bind);
    }
    Ok(query.fetch_optional(pool).await?)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_listing_by_url(
    pool: &PgPool,
    canonical_url: &str,
) -> Result<Option<ListingRow>, DbError> {
    fetch_one_where(pool, "canonical_url = $1", &[canonical_url]).await
}

/// Fallback identity for sources with stable native IDs. The most recently
/// seen row wins if URL drift ever produced duplicates.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_listing_by_source_id(
    pool: &PgPool,
    source: &str,
    source_listing_id: &str,
) -> Result<Option<ListingRow>, DbError> {
    fetch_one_where(
        pool,
        "source = $1 AND source_listing_id = $2 ORDER BY last_seen_at DESC",
        &[source, source_listing_id],
    )
    .await
}

/// Secondary fallback identity for sources without native IDs.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_listing_by_fingerprint(
    pool: &PgPool,
    source: &str,
    content_fingerprint: &str,
) -> Result<Option<ListingRow>, DbError> {
    fetch_one_where(
        pool,
        "source = $1 AND content_fingerprint = $2 ORDER BY last_seen_at DESC",
        &[source, content_fingerprint],
    )
    .await
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_listing(pool: &PgPool, id: i64) -> Result<ListingRow, DbError> {
    sqlx::query_as::<_, ListingRow>(&format!(
        "SELECT {LISTING_COLUMNS} FROM rental_listings WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// `last_seen_at` for each of `urls` that has a stored listing.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn listings_last_seen(
    pool: &PgPool,
    urls: &[String],
) -> Result<HashMap<String, DateTime<Utc>>, DbError> {
    if urls.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(String, DateTime<Utc>)> = sqlx::query_as(
        "SELECT canonical_url, last_seen_at FROM rental_listings WHERE canonical_url = ANY($1)",
    )
    .bind(urls)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Shared SET list for updates. `$1` is the row id in `update_listing`; the
/// scraped values start at `$2` in both statements. The manual-override
/// guard is enforced here as well as by the caller.
const GUARDED_SET: &str = "\
    source              = $2, \
    source_listing_id   = COALESCE($3, rental_listings.source_listing_id), \
    canonical_url       = $4, \
    title               = $5, \
    description         = $6, \
    city                = $7, \
    district            = $8, \
    latitude            = $9, \
    longitude           = $10, \
    property_type       = CASE WHEN rental_listings.manual_override \
                               THEN rental_listings.property_type ELSE $11 END, \
    bedrooms            = $12, \
    bathrooms           = $13, \
    size_sqm            = $14::numeric(10,2), \
    price_original      = $15::numeric(16,2), \
    price_monthly_usd   = $16::numeric(12,2), \
    currency            = $17, \
    image_urls          = $18, \
    amenities           = $19, \
    posted_at           = COALESCE($20, rental_listings.posted_at), \
    is_active           = CASE WHEN rental_listings.manual_override \
                               THEN rental_listings.is_active ELSE $21 END, \
    content_fingerprint = COALESCE($22, rental_listings.content_fingerprint), \
    last_seen_at        = GREATEST(rental_listings.last_seen_at, $23), \
    updated_at          = NOW()";

fn bind_write<'q>(
    query: sqlx::query::QueryAs<'q, sqlx::Postgres, ListingRow, sqlx::postgres::PgArguments>,
    write: &'q ListingWrite,
    seen_at: DateTime<Utc>,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, ListingRow, sqlx::postgres::PgArguments> {
    query
        .bind(&write.source)
        .bind(&write.source_listing_id)
        .bind(&write.canonical_url)
        .bind(&write.title)
        .bind(&write.description)
        .bind(&write.city)
        .bind(&write.district)
        .bind(write.latitude)
        .bind(write.longitude)
        .bind(write.property_type.as_str())
        .bind(write.bedrooms)
        .bind(write.bathrooms)
        .bind(write.size_sqm)
        .bind(write.price_original)
        .bind(write.price_monthly_usd)
        .bind(&write.currency)
        .bind(&write.image_urls)
        .bind(&write.amenities)
        .bind(write.posted_at)
        .bind(write.is_active)
        .bind(&write.content_fingerprint)
        .bind(seen_at)
}

/// Inserts a new listing with `first_seen_at = last_seen_at = seen_at`.
///
/// If another worker inserted the same `canonical_url` first, the existing
/// row is updated instead (with the manual-override guard applied).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_listing(
    pool: &PgPool,
    write: &ListingWrite,
    seen_at: DateTime<Utc>,
) -> Result<ListingRow, DbError> {
    let sql = format!(
        "INSERT INTO rental_listings \
             (public_id, source, source_listing_id, canonical_url, title, description, city, \
              district, latitude, longitude, property_type, bedrooms, bathrooms, size_sqm, \
              price_original, price_monthly_usd, currency, image_urls, amenities, posted_at, \
              is_active, content_fingerprint, first_seen_at, last_seen_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, \
                 $14::numeric(10,2), $15::numeric(16,2), $16::numeric(12,2), \
                 $17, $18, $19, $20, $21, $22, $23, $23) \
         ON CONFLICT (canonical_url) DO UPDATE SET {GUARDED_SET} \
         RETURNING {LISTING_COLUMNS}"
    );
    let row = bind_write(
        sqlx::query_as::<_, ListingRow>(&sql).bind(Uuid::new_v4()),
        write,
        seen_at,
    )
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Rewrites an existing listing from a fresh scrape.
///
/// `canonical_url` is overwritten so a listing resolved through its native
/// ID or fingerprint follows the source's current URL. `first_seen_at` is
/// never touched; `last_seen_at` only moves forward.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if `id` does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_listing(
    pool: &PgPool,
    id: i64,
    write: &ListingWrite,
    seen_at: DateTime<Utc>,
) -> Result<ListingRow, DbError> {
    let sql = format!(
        "UPDATE rental_listings SET {GUARDED_SET} WHERE id = $1 RETURNING {LISTING_COLUMNS}"
    );
    bind_write(sqlx::query_as::<_, ListingRow>(&sql).bind(id), write, seen_at)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Deactivates the listing stored under `canonical_url`, keeping its history.
/// Listings under manual override are left alone.
///
/// Returns `true` if an active listing was deactivated.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn deactivate_listing_by_url(pool: &PgPool, canonical_url: &str) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE rental_listings SET is_active = FALSE, updated_at = NOW() \
         WHERE canonical_url = $1 AND is_active AND NOT manual_override",
    )
    .bind(canonical_url)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Deactivates every active listing last seen before `cutoff`.
///
/// Manual overrides do not protect a listing from going stale.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_stale_listings(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE rental_listings SET is_active = FALSE, updated_at = NOW() \
         WHERE is_active AND last_seen_at < $1",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Pins a listing under manual override, optionally correcting its type
/// and active flag in the same statement.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if `id` does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn set_manual_override(
    pool: &PgPool,
    id: i64,
    property_type: Option<PropertyType>,
    is_active: Option<bool>,
) -> Result<ListingRow, DbError> {
    sqlx::query_as::<_, ListingRow>(&format!(
        "UPDATE rental_listings SET \
             manual_override = TRUE, \
             property_type   = COALESCE($2, property_type), \
             is_active       = COALESCE($3, is_active), \
             updated_at      = NOW() \
         WHERE id = $1 \
         RETURNING {LISTING_COLUMNS}"
    ))
    .bind(id)
    .bind(property_type.map(PropertyType::as_str))
    .bind(is_active)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns a listing to automated control.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if `id` does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn clear_manual_override(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE rental_listings SET manual_override = FALSE, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
