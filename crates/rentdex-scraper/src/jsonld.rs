//! schema.org JSON-LD extraction for listing pages.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use rentdex_core::{PropertyType, ScrapedListing};
use serde_json::Value;

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]+type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid regex")
});

const ACCEPTED_TYPES: &[&str] = &[
    "Apartment",
    "House",
    "SingleFamilyResidence",
    "Residence",
    "Accommodation",
    "RealEstateListing",
    "Product",
    "Offer",
    "Suite",
];

/// Nested keys under which listing sites put the actual property.
const NESTED_KEYS: &[&str] = &["mainEntity", "about", "itemOffered"];

const SQFT_TO_SQM: f64 = 0.092_903;

/// Extracts the first listing-like JSON-LD object on the page.
///
/// Returns `None` when the page carries no JSON-LD, or none of its objects
/// has an accepted `@type` and a `name`.
#[must_use]
pub fn extract_listing(html: &str) -> Option<ScrapedListing> {
    SCRIPT_RE
        .captures_iter(html)
        .filter_map(|cap| cap.get(1))
        .filter_map(|m| serde_json::from_str::<Value>(m.as_str().trim()).ok())
        .flat_map(expand_candidates)
        .find_map(|item| item_to_listing(&item))
}

/// Accept top-level object, array, or `@graph` container.
fn expand_candidates(value: Value) -> Vec<Value> {
    let mut candidates = match value {
        Value::Array(items) => items,
        other => vec![other],
    };
    let graphs: Vec<Value> = candidates
        .iter()
        .filter_map(|item| item.get("@graph").and_then(Value::as_array))
        .flatten()
        .cloned()
        .collect();
    candidates.extend(graphs);
    candidates
}

fn type_names(item: &Value) -> Vec<&str> {
    match item.get("@type") {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(arr)) => arr.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn has_accepted_type(item: &Value) -> bool {
    type_names(item)
        .iter()
        .any(|t| ACCEPTED_TYPES.iter().any(|a| t.eq_ignore_ascii_case(a)))
}

fn property_type_hint(layers: &[&Value]) -> Option<PropertyType> {
    layers.iter().flat_map(|l| type_names(l)).find_map(|t| {
        match t.to_ascii_lowercase().as_str() {
            "apartment" => Some(PropertyType::Apartment),
            "house" | "singlefamilyresidence" => Some(PropertyType::House),
            _ => None,
        }
    })
}

/// First layer that carries `key`.
fn lookup<'a>(layers: &[&'a Value], key: &str) -> Option<&'a Value> {
    layers.iter().find_map(|l| l.get(key)).filter(|v| !v.is_null())
}

fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_owned()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numbers arrive as JSON numbers, strings with separators ("1,200"), or
/// `QuantitativeValue` objects.
fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse().ok()
        }
        Value::Object(_) => v.get("value").and_then(as_number),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn as_count(v: &Value) -> Option<i32> {
    as_number(v)
        .filter(|n| n.is_finite() && *n >= 0.0 && *n < 1_000.0)
        .map(|n| n.round() as i32)
}

fn offer_layer(layers: &[&Value]) -> Option<Value> {
    match lookup(layers, "offers")? {
        Value::Array(arr) => arr.first().cloned(),
        other => Some(other.clone()),
    }
}

fn price_and_currency(layers: &[&Value]) -> (Option<f64>, Option<String>) {
    let offer = offer_layer(layers);
    let spec = offer.as_ref().and_then(|o| o.get("priceSpecification")).cloned();
    let mut price_layers: Vec<&Value> = Vec::new();
    if let Some(o) = offer.as_ref() {
        price_layers.push(o);
    }
    if let Some(s) = spec.as_ref() {
        price_layers.push(s);
    }
    // An `Offer` node itself holds price directly.
    price_layers.extend(layers.iter().copied());

    let price = lookup(&price_layers, "price").and_then(as_number);
    let currency = lookup(&price_layers, "priceCurrency").and_then(as_text);
    (price, currency)
}

fn floor_size_sqm(layers: &[&Value]) -> Option<f64> {
    let size = lookup(layers, "floorSize")?;
    let value = as_number(size)?;
    let unit = size
        .get("unitCode")
        .or_else(|| size.get("unitText"))
        .and_then(Value::as_str)
        .unwrap_or("MTK")
        .to_ascii_uppercase();
    let sqm = if unit == "FTK" || unit.contains("FT") {
        value * SQFT_TO_SQM
    } else {
        value
    };
    Some((sqm * 100.0).round() / 100.0)
}

fn address_parts(layers: &[&Value]) -> (Option<String>, Option<String>) {
    match lookup(layers, "address") {
        Some(address @ Value::Object(_)) => {
            let region = address.get("addressRegion").and_then(as_text);
            let locality = address.get("addressLocality").and_then(as_text);
            match region {
                Some(region) => (Some(region), locality),
                None => (locality, None),
            }
        }
        Some(Value::String(s)) => (Some(s.trim().to_owned()).filter(|s| !s.is_empty()), None),
        _ => (None, None),
    }
}

fn coordinate(layers: &[&Value], key: &str) -> Option<f64> {
    lookup(layers, "geo")
        .and_then(|g| g.get(key))
        .and_then(as_number)
        .filter(|n| n.is_finite())
}

fn image_urls(layers: &[&Value]) -> Vec<String> {
    let image_url = |v: &Value| match v {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Object(_) => v
            .get("url")
            .or_else(|| v.get("contentUrl"))
            .and_then(Value::as_str)
            .map(|s| s.trim().to_owned()),
        _ => None,
    };
    let mut urls: Vec<String> = match lookup(layers, "image") {
        Some(Value::Array(arr)) => arr.iter().filter_map(image_url).collect(),
        Some(v) => image_url(v).into_iter().collect(),
        None => Vec::new(),
    };
    urls.retain(|u| !u.is_empty());
    urls.dedup();
    urls
}

fn amenities(layers: &[&Value]) -> Vec<String> {
    let Some(Value::Array(features)) = lookup(layers, "amenityFeature") else {
        return Vec::new();
    };
    features
        .iter()
        .filter(|f| f.get("value").and_then(Value::as_bool) != Some(false))
        .filter_map(|f| match f {
            Value::String(s) => Some(s.trim().to_owned()),
            Value::Object(_) => f.get("name").and_then(as_text),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_posted_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc())
        })
}

fn item_to_listing(item: &Value) -> Option<ScrapedListing> {
    if !has_accepted_type(item) {
        return None;
    }

    let mut layers: Vec<&Value> = vec![item];
    layers.extend(
        NESTED_KEYS
            .iter()
            .filter_map(|k| item.get(*k))
            .filter(|v| v.is_object()),
    );

    let title = lookup(&layers, "name").and_then(as_text)?;
    let (price_original, currency) = price_and_currency(&layers);
    let (city, district) = address_parts(&layers);

    Some(ScrapedListing {
        title,
        description: lookup(&layers, "description").and_then(as_text),
        city,
        district,
        latitude: coordinate(&layers, "latitude"),
        longitude: coordinate(&layers, "longitude"),
        property_type: property_type_hint(&layers),
        bedrooms: lookup(&layers, "numberOfBedrooms")
            .or_else(|| lookup(&layers, "numberOfRooms"))
            .and_then(as_count),
        bathrooms: lookup(&layers, "numberOfBathroomsTotal")
            .or_else(|| lookup(&layers, "numberOfFullBathrooms"))
            .and_then(as_count),
        size_sqm: floor_size_sqm(&layers),
        price_original,
        price_monthly_usd: None,
        currency,
        image_urls: image_urls(&layers),
        amenities: amenities(&layers),
        posted_at: lookup(&layers, "datePosted")
            .and_then(Value::as_str)
            .and_then(parse_posted_at),
        source_listing_id: lookup(&layers, "identifier")
            .or_else(|| lookup(&layers, "sku"))
            .or_else(|| lookup(&layers, "productID"))
            .and_then(as_text),
    })
}
