//! Price statistics for the rental index.

/// Aggregates for one group of prices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub p25: f64,
    pub p75: f64,
}

/// Linear-interpolation percentile over an ascending slice.
///
/// `p` is a fraction in `[0, 1]`; the rank is `p * (n - 1)` and values
/// between two ranks are interpolated. Returns `None` for an empty slice.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)] // rank is clamped to [0, n - 1] before the casts back to usize
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = p.clamp(0.0, 1.0) * last as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Count, mean, median, P25 and P75 of `prices`. Non-finite values are
/// ignored; returns `None` when nothing usable remains.
#[must_use]
#[allow(clippy::cast_precision_loss)] // group sizes are far below 2^52
pub fn summarize(prices: &[f64]) -> Option<PriceStats> {
    let mut sorted: Vec<f64> = prices.iter().copied().filter(|p| p.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let count = sorted.len();
    let mean = sorted.iter().sum::<f64>() / count as f64;
    Some(PriceStats {
        count,
        mean,
        median: percentile(&sorted, 0.5)?,
        p25: percentile(&sorted, 0.25)?,
        p75: percentile(&sorted, 0.75)?,
    })
}
