//! Shared request pacing.
//!
//! A single [`RateLimiter`] is shared by every concurrent scan. It hands out
//! one permit per interval of `base + uniform(0, jitter)`, redrawn after every
//! grant, so the outbound request rate has a ceiling that does not depend on
//! how many targets are in flight.

use crate::types::ScanConfig;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Jittered interval rate limiter.
///
/// Waiters are served strictly in arrival order: the turnstile is a fair
/// mutex, and only the task holding it may wait for the next deadline.
#[derive(Debug)]
pub struct RateLimiter {
    /// Fixed part of the interval
    base: Duration,
    /// Upper bound of the random part of the interval
    jitter: Duration,
    /// FIFO queue of tasks waiting for a permit
    turnstile: tokio::sync::Mutex<()>,
    /// Earliest instant the next permit may be granted
    next_permit: Mutex<Instant>,
    /// Total permits granted so far
    granted: AtomicU64,
}

impl RateLimiter {
    /// Create a limiter whose first permit is one jittered interval away.
    pub fn new(base: Duration, jitter: Duration) -> Self {
        let first = Instant::now() + draw_interval(base, jitter);
        Self {
            base,
            jitter,
            turnstile: tokio::sync::Mutex::new(()),
            next_permit: Mutex::new(first),
            granted: AtomicU64::new(0),
        }
    }

    /// Create a limiter from the pacing settings in `config`.
    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.rate_base, config.rate_jitter)
    }

    /// Wait until a permit is granted.
    ///
    /// The deadline is re-read after every wake-up, so a concurrent
    /// [`reset`](Self::reset) that moves it is always honoured.
    pub async fn acquire(&self) {
        let _turn = self.turnstile.lock().await;

        loop {
            let deadline = *self.lock_next();
            if deadline <= Instant::now() {
                break;
            }
            tokio::time::sleep_until(deadline).await;
        }

        self.schedule_next();
        self.granted.fetch_add(1, Ordering::Relaxed);
    }

    /// Replace the current timer with a freshly jittered one.
    pub fn reset(&self) {
        self.schedule_next();
    }

    /// Number of permits granted since creation.
    pub fn permits_granted(&self) -> u64 {
        self.granted.load(Ordering::Relaxed)
    }

    /// Fixed part of the pacing interval.
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Upper bound of the random part of the pacing interval.
    pub fn jitter(&self) -> Duration {
        self.jitter
    }

    fn schedule_next(&self) {
        *self.lock_next() = Instant::now() + draw_interval(self.base, self.jitter);
    }

    fn lock_next(&self) -> MutexGuard<'_, Instant> {
        // The guarded value is a plain Instant, so a poisoned lock is still usable.
        self.next_permit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Draw one pacing interval: `base + uniform(0, jitter)`.
pub fn draw_interval(base: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        return base;
    }
    let max = u64::try_from(jitter.as_nanos()).unwrap_or(u64::MAX);
    base + Duration::from_nanos(rand::rng().random_range(0..=max))
}
