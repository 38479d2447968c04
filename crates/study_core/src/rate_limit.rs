//! Burst rate limiting over a rolling window.
//!
//! State lives in memory only and is lost on restart, so a restart hands every
//! caller a fresh window.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::clock::Clock;

/// Accepts at most `limit` events within any `window`.
pub struct RateLimiter {
    limit: usize,
    window_ms: i64,
    clock: Arc<dyn Clock>,
    events: Mutex<VecDeque<i64>>,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            limit,
            window_ms: i64::try_from(window.as_millis()).unwrap_or(i64::MAX),
            clock,
            events: Mutex::new(VecDeque::with_capacity(limit)),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms.max(0) as u64)
    }

    /// Records an event and returns true, or returns false without recording
    /// when the window is already full.
    pub fn check(&self) -> bool {
        let now = self.clock.now_millis();
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        self.trim(&mut events, now);
        if events.len() >= self.limit {
            return false;
        }
        events.push_back(now);
        true
    }

    /// How long until the next `check` can succeed; zero when a slot is free now.
    pub fn retry_after(&self) -> Duration {
        let now = self.clock.now_millis();
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        self.trim(&mut events, now);
        if events.len() < self.limit {
            return Duration::ZERO;
        }
        // The slot frees once the oldest event that keeps the window full expires.
        let blocking = events.len() - self.limit;
        match events.get(blocking) {
            Some(&oldest) => {
                let wait = (oldest + self.window_ms - now).max(0);
                Duration::from_millis(wait as u64)
            }
            None => self.window(),
        }
    }

    fn trim(&self, events: &mut VecDeque<i64>, now: i64) {
        while let Some(&oldest) = events.front() {
            if now - oldest >= self.window_ms {
                events.pop_front();
            } else {
                break;
            }
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limit", &self.limit)
            .field("window_ms", &self.window_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(limit: usize, window_ms: u64) -> (Arc<ManualClock>, RateLimiter) {
        let clock = Arc::new(ManualClock::at_date(2026, 5, 4));
        let limiter = RateLimiter::new(limit, Duration::from_millis(window_ms), clock.clone());
        (clock, limiter)
    }

    #[test]
    fn two_per_second_timeline() {
        let (clock, limiter) = limiter(2, 1000);
        assert!(limiter.check()); // t=0
        clock.advance_millis(100);
        assert!(limiter.check()); // t=100
        clock.advance_millis(100);
        assert!(!limiter.check()); // t=200
        clock.advance_millis(900);
        assert!(limiter.check()); // t=1100
    }

    #[test]
    fn n_accepted_then_rejected_until_window_passes() {
        let (clock, limiter) = limiter(5, 60_000);
        for _ in 0..5 {
            assert!(limiter.check());
            clock.advance_millis(10);
        }
        assert!(!limiter.check());
        assert!(!limiter.check());
        // Exactly one window after the first call.
        clock.advance_millis(60_000 - 50);
        assert!(limiter.check());
    }

    #[test]
    fn rejected_calls_are_not_recorded() {
        let (clock, limiter) = limiter(1, 1000);
        assert!(limiter.check());
        clock.advance_millis(900);
        assert!(!limiter.check());
        clock.advance_millis(100);
        // Had the rejected call at t=900 been recorded, this would still fail.
        assert!(limiter.check());
    }

    #[test]
    fn retry_after_points_at_oldest_expiry() {
        let (clock, limiter) = limiter(2, 1000);
        assert_eq!(limiter.retry_after(), Duration::ZERO);
        limiter.check();
        clock.advance_millis(300);
        limiter.check();
        assert_eq!(limiter.retry_after(), Duration::from_millis(700));
        clock.advance_millis(700);
        assert_eq!(limiter.retry_after(), Duration::ZERO);
    }

    #[test]
    fn zero_limit_rejects_everything() {
        let (_clock, limiter) = limiter(0, 1000);
        assert!(!limiter.check());
    }

    #[test]
    fn concurrent_checks_never_exceed_limit() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::at_date(2026, 5, 4));
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60), clock));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || (0..5).filter(|_| limiter.check()).count())
            })
            .collect();
        let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(accepted, 10);
    }
}
