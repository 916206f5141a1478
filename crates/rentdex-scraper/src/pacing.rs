//! Human-like request pacing.
//!
//! A [`PacingConfig`] describes the random delays the [`RequestLimiter`]
//! applies before each request: a base delay with jitter, an occasional
//! longer "reading" pause, a long breather after a randomized number of
//! requests, and extra idle time during the configured UTC night window.
//!
//! [`RequestLimiter`]: crate::client::RequestLimiter

use std::ops::RangeInclusive;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use rand::Rng;
use rentdex_core::AppConfig;

#[derive(Debug, Clone)]
pub struct PacingConfig {
    pub base_delay_ms: u64,
    pub jitter_ms: u64,
    /// Probability of adding a reading pause to a request.
    pub reading_pause_probability: f64,
    pub reading_pause_ms: RangeInclusive<u64>,
    /// Requests between two breathers; a fresh value is drawn after each.
    pub breather_every: RangeInclusive<u32>,
    pub breather_ms: RangeInclusive<u64>,
    /// UTC hour window `[start, end)`; equal values disable it.
    pub night_start_hour: u32,
    pub night_end_hour: u32,
    pub night_extra_ms: RangeInclusive<u64>,
    /// Probability that a claimed queue item is skipped for this run.
    pub skip_probability: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 2_500,
            jitter_ms: 2_000,
            reading_pause_probability: 0.11,
            reading_pause_ms: 8_000..=20_000,
            breather_every: 25..=60,
            breather_ms: 30_000..=90_000,
            night_start_hour: 17,
            night_end_hour: 23,
            night_extra_ms: 3_000..=8_000,
            skip_probability: 0.03,
        }
    }
}

impl PacingConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            base_delay_ms: config.scraper_base_delay_ms,
            jitter_ms: config.scraper_jitter_ms,
            night_start_hour: config.scraper_night_start_hour,
            night_end_hour: config.scraper_night_end_hour,
            ..Self::default()
        }
    }

    /// No delays, no breathers, no skips. Used by tests and one-off fetches.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            base_delay_ms: 0,
            jitter_ms: 0,
            reading_pause_probability: 0.0,
            reading_pause_ms: 0..=0,
            breather_every: u32::MAX..=u32::MAX,
            breather_ms: 0..=0,
            night_start_hour: 0,
            night_end_hour: 0,
            night_extra_ms: 0..=0,
            skip_probability: 0.0,
        }
    }

    #[must_use]
    pub fn is_night(&self, now: DateTime<Utc>) -> bool {
        in_window(now.hour(), self.night_start_hour, self.night_end_hour)
    }

    /// Delay before a request. `first` suppresses the base delay for the
    /// opening request of a burst.
    pub(crate) fn request_delay<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        first: bool,
        now: DateTime<Utc>,
    ) -> Duration {
        let mut ms = 0u64;
        if !first {
            ms += self.base_delay_ms + sample(rng, 0..=self.jitter_ms);
            if self.reading_pause_probability > 0.0
                && rng.random_bool(self.reading_pause_probability.min(1.0))
            {
                ms += sample(rng, self.reading_pause_ms.clone());
            }
        }
        if self.is_night(now) {
            ms += sample(rng, self.night_extra_ms.clone());
        }
        Duration::from_millis(ms)
    }

    pub(crate) fn next_breather_at<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let (lo, hi) = (*self.breather_every.start(), *self.breather_every.end());
        if lo >= hi {
            lo.max(1)
        } else {
            rng.random_range(lo..=hi).max(1)
        }
    }

    pub(crate) fn breather<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_millis(sample(rng, self.breather_ms.clone()))
    }

    pub(crate) fn roll_skip<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        self.skip_probability > 0.0 && rng.random_bool(self.skip_probability.min(1.0))
    }
}

fn sample<R: Rng + ?Sized>(rng: &mut R, range: RangeInclusive<u64>) -> u64 {
    let (lo, hi) = (*range.start(), *range.end());
    if lo >= hi {
        lo
    } else {
        rng.random_range(lo..=hi)
    }
}

/// `[start, end)` over a 24-hour clock, wrapping past midnight when
/// `start > end`.
fn in_window(hour: u32, start: u32, end: u32) -> bool {
    match start.cmp(&end) {
        std::cmp::Ordering::Equal => false,
        std::cmp::Ordering::Less => (start..end).contains(&hour),
        std::cmp::Ordering::Greater => hour >= start || hour < end,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 30, 0).unwrap()
    }

    #[test]
    fn night_window_plain_and_wrapping() {
        assert!(in_window(17, 17, 23));
        assert!(in_window(22, 17, 23));
        assert!(!in_window(23, 17, 23));
        assert!(!in_window(9, 17, 23));

        assert!(in_window(23, 22, 4));
        assert!(in_window(2, 22, 4));
        assert!(!in_window(4, 22, 4));

        assert!(!in_window(5, 5, 5));
    }

    #[test]
    fn first_request_skips_base_delay() {
        let pacing = PacingConfig {
            reading_pause_probability: 0.0,
            ..PacingConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(
            pacing.request_delay(&mut rng, true, at_hour(9)),
            Duration::ZERO
        );
    }

    #[test]
    fn delay_stays_within_base_plus_jitter() {
        let pacing = PacingConfig {
            reading_pause_probability: 0.0,
            ..PacingConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let d = pacing.request_delay(&mut rng, false, at_hour(9));
            assert!(d >= Duration::from_millis(2_500));
            assert!(d <= Duration::from_millis(4_500));
        }
    }

    #[test]
    fn night_adds_extra_delay() {
        let pacing = PacingConfig {
            reading_pause_probability: 0.0,
            ..PacingConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let d = pacing.request_delay(&mut rng, true, at_hour(20));
        assert!(d >= Duration::from_millis(3_000));
        assert!(d <= Duration::from_millis(8_000));
    }

    #[test]
    fn disabled_pacing_never_waits_or_skips() {
        let pacing = PacingConfig::disabled();
        let mut rng = StdRng::seed_from_u64(3);
        for hour in 0..24 {
            assert_eq!(
                pacing.request_delay(&mut rng, false, at_hour(hour)),
                Duration::ZERO
            );
        }
        assert!(!pacing.roll_skip(&mut rng));
        assert_eq!(pacing.next_breather_at(&mut rng), u32::MAX);
    }

    #[test]
    fn breather_interval_within_configured_range() {
        let pacing = PacingConfig::default();
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..100 {
            let n = pacing.next_breather_at(&mut rng);
            assert!((25..=60).contains(&n));
        }
    }
}
