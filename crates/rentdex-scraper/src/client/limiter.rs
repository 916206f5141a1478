//! Process-local request limiter: bounded concurrency plus pacing state.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::pacing::PacingConfig;

/// Bounds in-flight requests and applies [`PacingConfig`] delays.
///
/// One limiter is shared (behind an `Arc`) by every [`FetchClient`] clone in
/// a process. Tests build their own with [`PacingConfig::disabled`].
///
/// [`FetchClient`]: crate::client::FetchClient
#[derive(Debug)]
pub struct RequestLimiter {
    semaphore: Arc<Semaphore>,
    pacing: PacingConfig,
    first_request: AtomicBool,
    since_breather: AtomicU32,
    next_breather_at: AtomicU32,
}

impl RequestLimiter {
    #[must_use]
    pub fn new(max_concurrency: usize, pacing: PacingConfig) -> Self {
        let next_breather_at = pacing.next_breather_at(&mut rand::rng());
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            pacing,
            first_request: AtomicBool::new(true),
            since_breather: AtomicU32::new(0),
            next_breather_at: AtomicU32::new(next_breather_at),
        }
    }

    #[must_use]
    pub fn pacing(&self) -> &PacingConfig {
        &self.pacing
    }

    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits for a concurrency slot, then sleeps the paced delay while
    /// holding it. The returned permit must live for the whole request.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
            Ok(permit) => permit,
            // The semaphore is never closed while `self` is alive.
            Err(_) => unreachable!("request semaphore closed"),
        };

        let delay = self.plan_delay();
        if !delay.is_zero() {
            tracing::debug!(delay_ms = delay.as_millis(), "pacing before request");
            tokio::time::sleep(delay).await;
        }
        permit
    }

    /// Rolls the per-item skip chance.
    #[must_use]
    pub fn should_skip(&self) -> bool {
        self.pacing.roll_skip(&mut rand::rng())
    }

    /// Paced pause between two queue batches. Counts as the end of a burst,
    /// so the next request does not add another base delay.
    pub async fn pause_between_batches(&self) {
        let delay = {
            let mut rng = rand::rng();
            self.pacing.request_delay(&mut rng, false, Utc::now())
        };
        self.first_request.store(true, Ordering::Relaxed);
        if !delay.is_zero() {
            tracing::debug!(delay_ms = delay.as_millis(), "pausing between batches");
            tokio::time::sleep(delay).await;
        }
    }

    /// Computes the sleep for the next request and advances the breather
    /// counter. Must not hold the RNG across an await point.
    fn plan_delay(&self) -> Duration {
        let mut rng = rand::rng();
        let first = self.first_request.swap(false, Ordering::Relaxed);
        let mut delay = self.pacing.request_delay(&mut rng, first, Utc::now());

        let count = self.since_breather.fetch_add(1, Ordering::Relaxed) + 1;
        if count >= self.next_breather_at.load(Ordering::Relaxed) {
            self.since_breather.store(0, Ordering::Relaxed);
            self.next_breather_at
                .store(self.pacing.next_breather_at(&mut rng), Ordering::Relaxed);
            let breather = self.pacing.breather(&mut rng);
            tracing::info!(
                requests = count,
                breather_ms = breather.as_millis(),
                "taking a breather"
            );
            delay += breather;
        }
        delay
    }
}
