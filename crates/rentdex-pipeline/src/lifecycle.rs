//! Turning a scraped page into a listing write, and persisting it.
//!
//! [`plan_listing`] is pure: classification, price normalization, location
//! reconciliation and fingerprinting. [`persist_listing`] resolves the
//! stored identity, applies the manual-override guard, upserts and appends
//! a snapshot.

use chrono::{DateTime, SubsecRound, Utc};
use rentdex_core::{normalize_monthly_usd, resolve_location, ScrapedListing};
use rentdex_db::{ListingRow, ListingWrite, SnapshotWrite};
use rentdex_scraper::{classify_with_hint, fingerprint, Classification};
use sqlx::PgPool;

use crate::PipelineError;

/// What to do with one scraped page.
#[derive(Debug, Clone, PartialEq)]
pub enum ListingPlan {
    /// Store or refresh the listing.
    Write(Box<ListingWrite>),
    /// Not a residential rental.
    Filtered { reason: String },
    /// No price the index can use; nothing is stored.
    NoPrice,
}

/// Result of [`persist_listing`].
#[derive(Debug, Clone)]
pub struct Persisted {
    pub listing: ListingRow,
    pub created: bool,
}

/// Builds the write for a scraped listing.
///
/// The adapter's property type is only a hint; text classification decides.
/// `queued_listing_id` (found during discovery) fills in when the page
/// itself carries no native ID. The content fingerprint is computed only
/// for listings without a native ID.
#[must_use]
pub fn plan_listing(
    source: &str,
    canonical_url: &str,
    queued_listing_id: Option<&str>,
    scraped: ScrapedListing,
    khr_per_usd: f64,
) -> ListingPlan {
    let property_type = match classify_with_hint(
        &scraped.title,
        scraped.description.as_deref(),
        scraped.property_type,
    ) {
        Classification::Residential(property_type) => property_type,
        Classification::Rejected { signal } => {
            return ListingPlan::Filtered {
                reason: format!("non-residential listing ({signal})"),
            };
        }
    };

    let Some(price_monthly_usd) = normalize_monthly_usd(
        scraped.price_monthly_usd,
        scraped.price_original,
        scraped.currency.as_deref(),
        khr_per_usd,
    ) else {
        return ListingPlan::NoPrice;
    };

    let location = resolve_location(scraped.city.as_deref(), scraped.district.as_deref());
    if location.corrected {
        tracing::warn!(
            url = canonical_url,
            scraped_city = scraped.city.as_deref().unwrap_or("-"),
            city = location.city.as_deref().unwrap_or("-"),
            district = location.district.as_deref().unwrap_or("-"),
            "scraped city disagrees with district; using the district's city"
        );
    }

    let source_listing_id = scraped
        .source_listing_id
        .clone()
        .or_else(|| queued_listing_id.map(str::to_owned));
    let content_fingerprint = source_listing_id.is_none().then(|| {
        fingerprint(
            &scraped.title,
            location.district.as_deref(),
            scraped.bedrooms,
            property_type,
            Some(price_monthly_usd),
            scraped.first_image_url(),
        )
    });

    ListingPlan::Write(Box::new(ListingWrite {
        source: source.to_owned(),
        source_listing_id,
        canonical_url: canonical_url.to_owned(),
        title: scraped.title,
        description: scraped.description,
        city: location.city,
        district: location.district,
        latitude: scraped.latitude,
        longitude: scraped.longitude,
        property_type,
        bedrooms: scraped.bedrooms,
        bathrooms: scraped.bathrooms,
        size_sqm: scraped.size_sqm,
        price_original: scraped.price_original,
        price_monthly_usd: Some(price_monthly_usd),
        currency: scraped.currency,
        image_urls: scraped.image_urls,
        amenities: scraped.amenities,
        posted_at: scraped.posted_at,
        is_active: true,
        content_fingerprint,
    }))
}

/// Keeps the operator's `property_type` and `is_active` on a listing under
/// manual override. Every other field follows the scrape.
pub fn apply_override_guard(existing: &ListingRow, write: &mut ListingWrite) {
    if !existing.manual_override {
        return;
    }
    match existing.parsed_property_type() {
        Ok(property_type) => write.property_type = property_type,
        Err(err) => tracing::warn!(
            listing_id = existing.id,
            error = %err,
            "overridden listing has an unreadable property type"
        ),
    }
    write.is_active = existing.is_active;
}

/// Finds the stored listing for a write: by canonical URL, then native ID,
/// then content fingerprint.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] if a lookup fails.
pub async fn resolve_existing(
    pool: &PgPool,
    write: &ListingWrite,
) -> Result<Option<ListingRow>, PipelineError> {
    if let Some(row) = rentdex_db::find_listing_by_url(pool, &write.canonical_url).await? {
        return Ok(Some(row));
    }
    if let Some(id) = write.source_listing_id.as_deref() {
        if let Some(row) = rentdex_db::find_listing_by_source_id(pool, &write.source, id).await? {
            return Ok(Some(row));
        }
    }
    if let Some(fp) = write.content_fingerprint.as_deref() {
        if let Some(row) = rentdex_db::find_listing_by_fingerprint(pool, &write.source, fp).await? {
            return Ok(Some(row));
        }
    }
    Ok(None)
}

/// Upserts the listing and appends one snapshot.
///
/// A listing found under a different URL has its stored canonical URL
/// rewritten to the current one. `first_seen_at` is set only on insert.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] if any lookup or write fails.
pub async fn persist_listing(
    pool: &PgPool,
    mut write: ListingWrite,
    seen_at: DateTime<Utc>,
) -> Result<Persisted, PipelineError> {
    // Postgres keeps microseconds; compare against what it will store.
    let seen_at = seen_at.trunc_subsecs(6);
    let (listing, created) = match resolve_existing(pool, &write).await? {
        Some(existing) => {
            apply_override_guard(&existing, &mut write);
            if existing.canonical_url != write.canonical_url {
                tracing::info!(
                    listing_id = existing.id,
                    from = %existing.canonical_url,
                    to = %write.canonical_url,
                    "listing moved to a new canonical url"
                );
            }
            let row = rentdex_db::update_listing(pool, existing.id, &write, seen_at).await?;
            (row, false)
        }
        None => {
            let row = rentdex_db::insert_listing(pool, &write, seen_at).await?;
            // first_seen_at only equals seen_at when this call created the row.
            let created = row.first_seen_at == seen_at;
            (row, created)
        }
    };

    rentdex_db::insert_snapshot(
        pool,
        &SnapshotWrite {
            listing_id: listing.id,
            city: listing.city.clone(),
            district: listing.district.clone(),
            bedrooms: listing.bedrooms,
            property_type: write.property_type,
            price: write.price_monthly_usd,
            posted_at: write.posted_at,
            scraped_at: seen_at,
        },
    )
    .await?;

    Ok(Persisted { listing, created })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rentdex_core::PropertyType;

    fn scraped(title: &str) -> ScrapedListing {
        ScrapedListing {
            title: title.to_string(),
            description: Some("Fully furnished, pool and gym, close to Aeon Mall.".to_string()),
            city: Some("Phnom Penh".to_string()),
            district: Some("Chamkar Mon".to_string()),
            bedrooms: Some(2),
            bathrooms: Some(2),
            price_monthly_usd: Some(850.0),
            currency: Some("USD".to_string()),
            image_urls: vec!["https://img.example.com/a.jpg".to_string()],
            ..ScrapedListing::default()
        }
    }

    fn expect_write(plan: ListingPlan) -> ListingWrite {
        match plan {
            ListingPlan::Write(write) => *write,
            other => panic!("expected a write, got {other:?}"),
        }
    }

    #[test]
    fn residential_listing_becomes_a_write() {
        let write = expect_write(plan_listing(
            "khmer24",
            "https://www.khmer24.com/en/a-1.html",
            None,
            scraped("Luxury penthouse with rooftop pool"),
            4100.0,
        ));

        assert_eq!(write.property_type, PropertyType::Penthouse);
        assert_eq!(write.price_monthly_usd, Some(850.0));
        assert!(write.is_active);
        assert_eq!(write.source, "khmer24");
    }

    #[test]
    fn warehouse_is_filtered() {
        let mut listing = scraped("Warehouse for rent near the port");
        listing.description = Some("Loading dock, 3 phase power.".to_string());
        let plan = plan_listing("khmer24", "https://x.example/1", None, listing, 4100.0);
        assert!(matches!(plan, ListingPlan::Filtered { ref reason } if reason.contains("warehouse")));
    }

    #[test]
    fn missing_price_is_no_price() {
        let mut listing = scraped("2 bedroom apartment");
        listing.price_monthly_usd = None;
        listing.price_original = None;
        let plan = plan_listing("khmer24", "https://x.example/1", None, listing, 4100.0);
        assert_eq!(plan, ListingPlan::NoPrice);
    }

    #[test]
    fn riel_price_is_converted() {
        let mut listing = scraped("2 bedroom apartment");
        listing.price_monthly_usd = None;
        listing.price_original = Some(2_050_000.0);
        listing.currency = Some("KHR".to_string());
        let write = expect_write(plan_listing("khmer24", "https://x.example/1", None, listing, 4100.0));
        assert_eq!(write.price_monthly_usd, Some(500.0));
        assert_eq!(write.price_original, Some(2_050_000.0));
    }

    #[test]
    fn fingerprint_only_without_native_id() {
        let without = expect_write(plan_listing(
            "khmer24",
            "https://x.example/1",
            None,
            scraped("2 bedroom apartment"),
            4100.0,
        ));
        assert!(without.source_listing_id.is_none());
        assert_eq!(without.content_fingerprint.as_ref().map(String::len), Some(64));

        let queued = expect_write(plan_listing(
            "khmer24",
            "https://x.example/1",
            Some("K24-9"),
            scraped("2 bedroom apartment"),
            4100.0,
        ));
        assert_eq!(queued.source_listing_id.as_deref(), Some("K24-9"));
        assert!(queued.content_fingerprint.is_none());

        let mut native = scraped("2 bedroom apartment");
        native.source_listing_id = Some("NATIVE-1".to_string());
        let native = expect_write(plan_listing("khmer24", "https://x.example/1", Some("K24-9"), native, 4100.0));
        assert_eq!(native.source_listing_id.as_deref(), Some("NATIVE-1"));
    }

    #[test]
    fn district_in_city_field_is_moved() {
        let mut listing = scraped("2 bedroom apartment");
        listing.city = Some("Daun Penh".to_string());
        listing.district = None;
        let write = expect_write(plan_listing("khmer24", "https://x.example/1", None, listing, 4100.0));
        assert_eq!(write.city.as_deref(), Some("Phnom Penh"));
        assert_eq!(write.district.as_deref(), Some("Daun Penh"));
    }

    fn stored(manual_override: bool) -> ListingRow {
        let now = Utc::now();
        ListingRow {
            id: 1,
            public_id: uuid::Uuid::nil(),
            source: "khmer24".to_string(),
            source_listing_id: None,
            canonical_url: "https://x.example/1".to_string(),
            title: "2 bedroom apartment".to_string(),
            description: None,
            city: None,
            district: None,
            latitude: None,
            longitude: None,
            property_type: "VILLA".to_string(),
            bedrooms: None,
            bathrooms: None,
            size_sqm: None,
            price_original: None,
            price_monthly_usd: None,
            currency: None,
            image_urls: vec![],
            amenities: vec![],
            posted_at: None,
            first_seen_at: now,
            last_seen_at: now,
            is_active: false,
            manual_override,
            content_fingerprint: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn override_guard_keeps_operator_fields() {
        let mut write = expect_write(plan_listing(
            "khmer24",
            "https://x.example/1",
            None,
            scraped("2 bedroom apartment"),
            4100.0,
        ));
        apply_override_guard(&stored(true), &mut write);
        assert_eq!(write.property_type, PropertyType::Villa);
        assert!(!write.is_active);
        assert_eq!(write.price_monthly_usd, Some(850.0));
    }

    #[test]
    fn override_guard_is_inert_without_override() {
        let mut write = expect_write(plan_listing(
            "khmer24",
            "https://x.example/1",
            None,
            scraped("2 bedroom apartment"),
            4100.0,
        ));
        apply_override_guard(&stored(false), &mut write);
        assert_eq!(write.property_type, PropertyType::Apartment);
        assert!(write.is_active);
    }
}
