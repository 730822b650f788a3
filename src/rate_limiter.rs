use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::rate_limit_config::RateLimitSettings;

/// In-process sliding window limiter shared by every request handler.
///
/// Admission timestamps are kept oldest first. A timestamp `t` counts
/// towards the limit while `now - t < window`, so the window is the
/// half-open interval `(now - window, now]`.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    settings: RateLimitSettings,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            settings,
            timestamps: Mutex::new(VecDeque::with_capacity(settings.limit.min(1024))),
        }
    }

    pub fn settings(&self) -> RateLimitSettings {
        self.settings
    }

    /// Admit or reject one request arriving now
    pub fn admit(&self) -> bool {
        self.admit_at(Instant::now())
    }

    /// Admit or reject one request arriving at `now`.
    ///
    /// `now` must not go backwards between calls.
    pub fn admit_at(&self, now: Instant) -> bool {
        let mut timestamps = self.lock();
        self.purge(&mut timestamps, now);

        if timestamps.len() >= self.settings.limit {
            tracing::debug!(
                in_window = timestamps.len(),
                limit = self.settings.limit,
                "Request rejected by rate limiter"
            );
            return false;
        }

        timestamps.push_back(now);
        true
    }

    /// How long until the next request would be admitted
    pub fn retry_after(&self) -> Duration {
        self.retry_after_at(Instant::now())
    }

    pub fn retry_after_at(&self, now: Instant) -> Duration {
        let mut timestamps = self.lock();
        self.purge(&mut timestamps, now);

        if timestamps.len() < self.settings.limit {
            return Duration::ZERO;
        }

        // The oldest entry has to age out before a slot frees up.
        match timestamps.front() {
            Some(oldest) => (*oldest + self.settings.window).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Number of admissions currently inside the window
    pub fn in_window(&self) -> usize {
        self.in_window_at(Instant::now())
    }

    pub fn in_window_at(&self, now: Instant) -> usize {
        let mut timestamps = self.lock();
        self.purge(&mut timestamps, now);
        timestamps.len()
    }

    fn purge(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = timestamps.front() {
            if now.saturating_duration_since(*oldest) >= self.settings.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        // The queue is consistent after every push/pop, so a poisoned lock is safe to reuse.
        self.timestamps.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new(RateLimitSettings::default())
    }
}
