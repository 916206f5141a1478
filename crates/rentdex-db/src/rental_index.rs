//! Database operations for `rental_index_daily` and `rental_index_monthly`.
//!
//! Both tables are fully derived from `rental_snapshots`; every rebuild
//! replaces a period's rows inside one transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

/// Statistics for one `(city, district, bedrooms, property_type)` group.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexGroupStats {
    pub city: Option<String>,
    pub district: Option<String>,
    pub bedrooms: Option<i32>,
    pub property_type: String,
    pub listing_count: i32,
    pub median_price: f64,
    pub mean_price: f64,
    pub p25_price: f64,
    pub p75_price: f64,
}

/// A row from `rental_index_daily` or `rental_index_monthly`.
///
/// `period` is `index_date` for daily rows and `index_month` (first of the
/// month) for monthly rows.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DailyIndexRow {
    pub id: i64,
    pub period: NaiveDate,
    pub city: Option<String>,
    pub district: Option<String>,
    pub bedrooms: Option<i32>,
    pub property_type: String,
    pub listing_count: i32,
    pub median_price: Decimal,
    pub mean_price: Decimal,
    pub p25_price: Decimal,
    pub p75_price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Replaces every daily row for `date` with `groups`.
///
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the transaction is
/// rolled back and the previous rows stay in place.
pub async fn replace_daily_index(
    pool: &PgPool,
    date: NaiveDate,
    groups: &[IndexGroupStats],
) -> Result<u64, DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM rental_index_daily WHERE index_date = $1")
        .bind(date)
        .execute(&mut *tx)
        .await?;

    let mut written = 0u64;
    for group in groups {
        sqlx::query(
            "INSERT INTO rental_index_daily \
                 (index_date, city, district, bedrooms, property_type, listing_count, \
                  median_price, mean_price, p25_price, p75_price) \
             VALUES ($1, $2, $3, $4, $5, $6, \
                     $7::numeric(12,2), $8::numeric(12,2), $9::numeric(12,2), $10::numeric(12,2))",
        )
        .bind(date)
        .bind(&group.city)
        .bind(&group.district)
        .bind(group.bedrooms)
        .bind(&group.property_type)
        .bind(group.listing_count)
        .bind(group.median_price)
        .bind(group.mean_price)
        .bind(group.p25_price)
        .bind(group.p75_price)
        .execute(&mut *tx)
        .await?;
        written += 1;
    }

    tx.commit().await?;
    Ok(written)
}

/// Rebuilds the monthly rows for the month starting at `month_start` by
/// averaging that month's daily rows per group. `listing_count` is the
/// rounded mean of the daily counts.
///
/// Returns the number of monthly rows written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the transaction is
/// rolled back.
pub async fn rebuild_monthly_index(pool: &PgPool, month_start: NaiveDate) -> Result<u64, DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM rental_index_monthly WHERE index_month = $1")
        .bind(month_start)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query(
        "INSERT INTO rental_index_monthly \
             (index_month, city, district, bedrooms, property_type, listing_count, \
              median_price, mean_price, p25_price, p75_price) \
         SELECT $1, city, district, bedrooms, property_type, \
                ROUND(AVG(listing_count))::int, \
                ROUND(AVG(median_price), 2), ROUND(AVG(mean_price), 2), \
                ROUND(AVG(p25_price), 2), ROUND(AVG(p75_price), 2) \
         FROM rental_index_daily \
         WHERE index_date >= $1 AND index_date < ($1 + INTERVAL '1 month')::date \
         GROUP BY city, district, bedrooms, property_type",
    )
    .bind(month_start)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(result.rows_affected())
}

/// Daily rows for `date`, ordered by group.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_daily_index(pool: &PgPool, date: NaiveDate) -> Result<Vec<DailyIndexRow>, DbError> {
    let rows = sqlx::query_as::<_, DailyIndexRow>(
        "SELECT id, index_date AS period, city, district, bedrooms, property_type, \
                listing_count, median_price, mean_price, p25_price, p75_price, created_at \
         FROM rental_index_daily \
         WHERE index_date = $1 \
         ORDER BY city NULLS LAST, district NULLS LAST, bedrooms NULLS LAST, property_type",
    )
    .bind(date)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Monthly rows for the month starting at `month_start`, ordered by group.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_monthly_index(
    pool: &PgPool,
    month_start: NaiveDate,
) -> Result<Vec<DailyIndexRow>, DbError> {
    let rows = sqlx::query_as::<_, DailyIndexRow>(
        "SELECT id, index_month AS period, city, district, bedrooms, property_type, \
                listing_count, median_price, mean_price, p25_price, p75_price, created_at \
         FROM rental_index_monthly \
         WHERE index_month = $1 \
         ORDER BY city NULLS LAST, district NULLS LAST, bedrooms NULLS LAST, property_type",
    )
    .bind(month_start)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
