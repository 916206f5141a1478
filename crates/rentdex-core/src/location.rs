//! City/district validation against a static gazetteer.
//!
//! Listing sites frequently put a district into the city field (or a city
//! the district does not belong to). A known district always determines its
//! city; the scraped city is only trusted when the district is unknown.

/// `(city alias, canonical city)`, aliases pre-normalized by [`normalize_key`].
const CITIES: &[(&str, &str)] = &[
    ("phnompenh", "Phnom Penh"),
    ("pp", "Phnom Penh"),
    ("siemreap", "Siem Reap"),
    ("sihanoukville", "Sihanoukville"),
    ("preahsihanouk", "Sihanoukville"),
    ("kompongsom", "Sihanoukville"),
    ("kampot", "Kampot"),
];

/// `(district alias, canonical district, canonical city)`.
const DISTRICTS: &[(&str, &str, &str)] = &[
    ("bkk1", "BKK1", "Phnom Penh"),
    ("boeungkengkang1", "BKK1", "Phnom Penh"),
    ("bkk2", "BKK2", "Phnom Penh"),
    ("boeungkengkang2", "BKK2", "Phnom Penh"),
    ("bkk3", "BKK3", "Phnom Penh"),
    ("boeungkengkang3", "BKK3", "Phnom Penh"),
    ("chamkarmon", "Chamkar Mon", "Phnom Penh"),
    ("daunpenh", "Daun Penh", "Phnom Penh"),
    ("tonlebassac", "Tonle Bassac", "Phnom Penh"),
    ("toulkork", "Toul Kork", "Phnom Penh"),
    ("tuolkouk", "Toul Kork", "Phnom Penh"),
    ("toulkouk", "Toul Kork", "Phnom Penh"),
    ("toultompoung", "Toul Tom Poung", "Phnom Penh"),
    ("tuoltumpung", "Toul Tom Poung", "Phnom Penh"),
    ("russianmarket", "Toul Tom Poung", "Phnom Penh"),
    ("boeungtrabek", "Boeung Trabek", "Phnom Penh"),
    ("7makara", "7 Makara", "Phnom Penh"),
    ("prampirmakara", "7 Makara", "Phnom Penh"),
    ("sensok", "Sen Sok", "Phnom Penh"),
    ("russeykeo", "Russey Keo", "Phnom Penh"),
    ("chroychangvar", "Chroy Changvar", "Phnom Penh"),
    ("meanchey", "Mean Chey", "Phnom Penh"),
    ("chbarampov", "Chbar Ampov", "Phnom Penh"),
    ("porsenchey", "Por Sen Chey", "Phnom Penh"),
    ("dangkao", "Dangkao", "Phnom Penh"),
    ("svaydangkum", "Svay Dangkum", "Siem Reap"),
    ("salakamreuk", "Sala Kamreuk", "Siem Reap"),
    ("slakram", "Sla Kram", "Siem Reap"),
    ("koukchak", "Kouk Chak", "Siem Reap"),
    ("watbo", "Wat Bo", "Siem Reap"),
    ("otres", "Otres", "Sihanoukville"),
    ("ochheuteal", "Ochheuteal", "Sihanoukville"),
    ("victoryhill", "Victory Hill", "Sihanoukville"),
    ("kampottown", "Kampot Town", "Kampot"),
];

/// A validated city/district pair.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub city: Option<String>,
    pub district: Option<String>,
    /// `true` when the scraped city was replaced or a district was moved out
    /// of the city field.
    pub corrected: bool,
}

fn normalize_key(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn lookup_city(raw: &str) -> Option<&'static str> {
    let key = normalize_key(raw);
    CITIES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, city)| *city)
}

fn lookup_district(raw: &str) -> Option<(&'static str, &'static str)> {
    let key = normalize_key(raw);
    DISTRICTS
        .iter()
        .find(|(alias, _, _)| *alias == key)
        .map(|(_, district, city)| (*district, *city))
}

fn clean(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Reconcile a scraped city/district pair against the gazetteer.
#[must_use]
pub fn resolve_location(city: Option<&str>, district: Option<&str>) -> Location {
    let city = clean(city);
    let district = clean(district);

    if let Some((canonical_district, canonical_city)) = district.and_then(lookup_district) {
        let scraped_city = city.and_then(lookup_city).or(city);
        return Location {
            city: Some(canonical_city.to_string()),
            district: Some(canonical_district.to_string()),
            corrected: scraped_city.is_some_and(|c| c != canonical_city),
        };
    }

    // The city field holds a district name and no usable district was given.
    if district.is_none() {
        if let Some((canonical_district, canonical_city)) = city.and_then(lookup_district) {
            return Location {
                city: Some(canonical_city.to_string()),
                district: Some(canonical_district.to_string()),
                corrected: true,
            };
        }
    }

    Location {
        city: city.map(|c| lookup_city(c).map_or_else(|| c.to_string(), str::to_string)),
        district: district.map(str::to_string),
        corrected: false,
    }
}
