//! Monthly USD price normalization.

/// Lowest monthly rent treated as a real asking price.
pub const MIN_MONTHLY_USD: f64 = 50.0;
/// Highest monthly rent treated as a real asking price; anything above is
/// almost always a sale price or a typo.
pub const MAX_MONTHLY_USD: f64 = 100_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Currency {
    Usd,
    Khr,
}

impl Currency {
    /// Parses a currency code or symbol. Unknown codes return `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "USD" | "US$" | "$" => Some(Currency::Usd),
            "KHR" | "RIEL" | "RIELS" | "៛" => Some(Currency::Khr),
            _ => None,
        }
    }
}

/// Returns a usable monthly USD price, or `None` if the listing has no price
/// the index can use.
///
/// An explicit `price_monthly_usd` wins. Otherwise `price_original` is
/// converted from `currency` (a missing currency is assumed to be USD).
/// Results outside [`MIN_MONTHLY_USD`, `MAX_MONTHLY_USD`] are discarded.
#[must_use]
pub fn normalize_monthly_usd(
    price_monthly_usd: Option<f64>,
    price_original: Option<f64>,
    currency: Option<&str>,
    khr_per_usd: f64,
) -> Option<f64> {
    let usd = match price_monthly_usd {
        Some(usd) => Some(usd),
        None => {
            let original = price_original?;
            match currency.map_or(Some(Currency::Usd), Currency::parse)? {
                Currency::Usd => Some(original),
                Currency::Khr if khr_per_usd > 0.0 => Some(original / khr_per_usd),
                Currency::Khr => None,
            }
        }
    }?;

    if usd.is_finite() && (MIN_MONTHLY_USD..=MAX_MONTHLY_USD).contains(&usd) {
        Some((usd * 100.0).round() / 100.0)
    } else {
        None
    }
}
