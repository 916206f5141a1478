//! Content fingerprint for sources that expose no stable listing ID.

use rentdex_core::PropertyType;
use sha2::{Digest, Sha256};

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Rounds to the nearest 10 so small price edits keep the same fingerprint.
fn price_bucket(price: f64) -> i64 {
    #[allow(clippy::cast_possible_truncation)]
    let bucket = ((price / 10.0).round_ties_even() * 10.0) as i64;
    bucket
}

/// SHA-256 hex digest identifying a listing by its content.
///
/// Inputs are lowercased, trimmed and whitespace-collapsed; missing values
/// contribute an empty segment.
#[must_use]
pub fn fingerprint(
    title: &str,
    district: Option<&str>,
    bedrooms: Option<i32>,
    property_type: PropertyType,
    price: Option<f64>,
    first_image_url: Option<&str>,
) -> String {
    let parts = [
        normalize(title),
        district.map(normalize).unwrap_or_default(),
        bedrooms.map(|b| b.to_string()).unwrap_or_default(),
        property_type.as_str().to_owned(),
        price
            .filter(|p| p.is_finite())
            .map(|p| price_bucket(p).to_string())
            .unwrap_or_default(),
        first_image_url.map(str::trim).unwrap_or_default().to_owned(),
    ];
    format!("{:x}", Sha256::digest(parts.join("|").as_bytes()))
}
