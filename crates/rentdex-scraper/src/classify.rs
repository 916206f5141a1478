//! Rule-based residential property classification.
//!
//! Classification runs in two stages. Non-residential signals (warehouse,
//! office space, shophouse, land for sale, ...) reject a listing unless a
//! strong residential signal appears alongside them. Surviving listings get
//! the most specific [`PropertyType`] whose keywords match, falling back to
//! [`PropertyType::Apartment`].
//!
//! Titles are often generic ("For rent in BKK1") while the opening lines of
//! the description say what the property actually is, so the first
//! [`HEADLINE_CHARS`] characters of the description are checked separately
//! and may reject or refine the title's verdict.

use std::sync::LazyLock;

use regex::Regex;
use rentdex_core::PropertyType;

/// Length of the description prefix treated as a headline.
pub const HEADLINE_CHARS: usize = 250;

static NON_RESIDENTIAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(warehouses?|office\s+spaces?|offices?\s+for\s+(?:rent|lease|sale)|shop\s?houses?|land\s+for\s+(?:sale|rent|lease)|commercial\s+(?:space|building|property|unit)s?|retail\s+spaces?|showrooms?|factory|factories|(?:restaurant|hotel|building|guesthouse)\s+for\s+(?:rent|sale|lease)|co-?working|storage\s+spaces?)\b",
    )
    .expect("valid non-residential regex")
});

static RESIDENTIAL_SIGNAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\b\d+\s*(?:br|bed|beds|bedrooms?)\b|\bbedrooms?\b|\bliving\s+room\b|\b(?:apartment|condo|house|villa|flat|penthouse|studio|townhouse)\s+for\s+(?:rent|lease)\b)",
    )
    .expect("valid residential regex")
});

static TYPE_PATTERNS: LazyLock<Vec<(PropertyType, Regex)>> = LazyLock::new(|| {
    [
        (PropertyType::Penthouse, r"(?i)\bpent[\s-]?houses?\b"),
        (
            PropertyType::ServicedApartment,
            r"(?i)\bserviced[\s-]+(?:apartment|apt|flat|residence|condo)s?\b",
        ),
        (
            PropertyType::Townhouse,
            r"(?i)\b(?:town|link|terrace|row)[\s-]?houses?\b|\bborey\b",
        ),
        (PropertyType::Villa, r"(?i)\bvillas?\b"),
        (PropertyType::House, r"(?i)\b(?:houses?|homes?|bungalows?)\b"),
        (PropertyType::Condo, r"(?i)\bcondo(?:minium)?s?\b"),
        (
            PropertyType::Apartment,
            r"(?i)\b(?:apartments?|apts?|flats?|studios?|duplex(?:es)?|lofts?)\b",
        ),
    ]
    .into_iter()
    .map(|(t, pattern)| (t, Regex::new(pattern).expect("valid property type regex")))
    .collect()
});

/// Outcome of classifying a listing's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Residential(PropertyType),
    /// Not a residential rental. `signal` is the matched keyword.
    Rejected { signal: String },
}

impl Classification {
    #[must_use]
    pub fn property_type(&self) -> Option<PropertyType> {
        match self {
            Classification::Residential(t) => Some(*t),
            Classification::Rejected { .. } => None,
        }
    }
}

/// Classifies a listing from its title and optional description.
#[must_use]
pub fn classify(title: &str, description: Option<&str>) -> Classification {
    classify_with_hint(title, description, None)
}

/// Like [`classify`], but uses `hint` (the adapter's structured guess) when
/// neither the title nor the headline names a type.
#[must_use]
pub fn classify_with_hint(
    title: &str,
    description: Option<&str>,
    hint: Option<PropertyType>,
) -> Classification {
    let description = description.unwrap_or_default();
    let headline: String = description.chars().take(HEADLINE_CHARS).collect();
    let full = format!("{title}\n{description}");

    if let Some(signal) = non_residential_signal(&full) {
        if !RESIDENTIAL_SIGNAL_RE.is_match(&full) {
            return Classification::Rejected { signal };
        }
    }

    if let Some(signal) = non_residential_signal(&headline) {
        if !RESIDENTIAL_SIGNAL_RE.is_match(&headline) && !RESIDENTIAL_SIGNAL_RE.is_match(title) {
            return Classification::Rejected { signal };
        }
    }

    let property_type = match (detect_type(title), detect_type(&headline)) {
        (Some(from_title), Some(from_headline))
            if from_headline.specificity_rank() < from_title.specificity_rank() =>
        {
            from_headline
        }
        (Some(from_title), _) => from_title,
        (None, Some(from_headline)) => from_headline,
        (None, None) => hint
            .or_else(|| detect_type(description))
            .unwrap_or(PropertyType::Apartment),
    };

    Classification::Residential(property_type)
}

fn non_residential_signal(text: &str) -> Option<String> {
    NON_RESIDENTIAL_RE
        .find(text)
        .map(|m| m.as_str().to_lowercase())
}

/// Most specific property type mentioned in `text`.
fn detect_type(text: &str) -> Option<PropertyType> {
    TYPE_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(t, _)| *t)
}

#[cfg(test)]
#[path = "classify_test.rs"]
mod tests;
