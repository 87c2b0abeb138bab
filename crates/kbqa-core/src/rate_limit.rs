//! Per-client sliding-window rate limiting.
//!
//! Each client keeps a time-ordered deque of admitted request timestamps.
//! On every check the deque is trimmed to the current window, and the
//! request is admitted iff fewer than `requests_per_window` remain.
//!
//! Client state is only trimmed when that client calls again, so idle
//! clients accumulate. [`RateLimiter::evict_idle`] drops clients whose
//! window has emptied and should be run periodically.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};

/// Stricter tier for expensive or abusable operations such as uploads.
pub const UPLOAD_REQUESTS_PER_WINDOW: usize = 10;
/// Looser tier for general traffic.
pub const GENERAL_REQUESTS_PER_WINDOW: usize = 60;
pub const DEFAULT_WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitStats {
    /// Clients with at least one request inside the current window.
    pub active_clients: usize,
    pub total_recent_requests: usize,
    pub limit: usize,
    pub window_secs: i64,
}

pub struct RateLimiter {
    requests_per_window: usize,
    window: TimeDelta,
    clients: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
    clock: Arc<dyn Clock>,
}

/// Drop timestamps that fell out of the window ending at `now`.
fn trim(window: &mut VecDeque<DateTime<Utc>>, cutoff: DateTime<Utc>) {
    while window.front().is_some_and(|&t| t < cutoff) {
        window.pop_front();
    }
}

impl RateLimiter {
    pub fn new(requests_per_window: usize, window: TimeDelta) -> Self {
        Self::with_clock(requests_per_window, window, Arc::new(SystemClock))
    }

    pub fn with_clock(requests_per_window: usize, window: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            requests_per_window,
            window,
            clients: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn limit(&self) -> usize {
        self.requests_per_window
    }

    pub fn window(&self) -> TimeDelta {
        self.window
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<DateTime<Utc>>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Admit or reject one request from `client`.
    ///
    /// An admitted request is recorded; a rejected one is not.
    pub fn is_allowed(&self, client: &str) -> bool {
        let now = self.clock.now();
        let cutoff = self.cutoff(now);
        let mut clients = self.lock();
        let window = clients.entry(client.to_string()).or_default();
        trim(window, cutoff);

        if window.len() < self.requests_per_window {
            window.push_back(now);
            true
        } else {
            warn!(
                client,
                limit = self.requests_per_window,
                window_secs = self.window.num_seconds(),
                "rate limit exceeded"
            );
            false
        }
    }

    /// When the oldest counted request leaves the window.
    ///
    /// `None` if the client has no requests inside the current window.
    pub fn reset_time(&self, client: &str) -> Option<DateTime<Utc>> {
        let cutoff = self.cutoff(self.clock.now());
        let clients = self.lock();
        let oldest = clients.get(client)?.iter().find(|&&t| t >= cutoff)?;
        oldest.checked_add_signed(self.window)
    }

    pub fn stats(&self) -> RateLimitStats {
        let cutoff = self.cutoff(self.clock.now());
        let clients = self.lock();
        let mut active_clients = 0;
        let mut total_recent_requests = 0;
        for window in clients.values() {
            let recent = window.iter().filter(|&&t| t >= cutoff).count();
            if recent > 0 {
                active_clients += 1;
                total_recent_requests += recent;
            }
        }
        RateLimitStats {
            active_clients,
            total_recent_requests,
            limit: self.requests_per_window,
            window_secs: self.window.num_seconds(),
        }
    }

    /// Number of clients currently tracked, idle or not.
    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    /// Trim every client's window and forget clients left with none.
    ///
    /// Returns how many clients were removed.
    pub fn evict_idle(&self) -> usize {
        let cutoff = self.cutoff(self.clock.now());
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|_, window| {
            trim(window, cutoff);
            !window.is_empty()
        });
        let evicted = before - clients.len();
        if evicted > 0 {
            debug!(evicted, remaining = clients.len(), "evicted idle rate-limit clients");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(limit: usize, window_secs: i64) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let limiter = RateLimiter::with_clock(limit, TimeDelta::seconds(window_secs), clock.clone());
        (limiter, clock)
    }

    #[test]
    fn test_admits_up_to_limit_then_rejects() {
        let (limiter, clock) = limiter(3, 60);
        let results: Vec<bool> = (0..4).map(|_| limiter.is_allowed("a")).collect();
        assert_eq!(results, vec![true, true, true, false]);

        clock.advance(TimeDelta::seconds(61));
        assert!(limiter.is_allowed("a"));
    }

    #[test]
    fn test_clients_are_independent() {
        let (limiter, _) = limiter(2, 60);
        assert!(limiter.is_allowed("a"));
        assert!(limiter.is_allowed("a"));
        assert!(!limiter.is_allowed("a"));
        assert!(limiter.is_allowed("b"));
        assert!(limiter.is_allowed("b"));
    }

    #[test]
    fn test_window_slides() {
        let (limiter, clock) = limiter(2, 60);
        assert!(limiter.is_allowed("a"));
        clock.advance(TimeDelta::seconds(30));
        assert!(limiter.is_allowed("a"));
        assert!(!limiter.is_allowed("a"));
        // First request leaves the window; second is still counted.
        clock.advance(TimeDelta::seconds(31));
        assert!(limiter.is_allowed("a"));
        assert!(!limiter.is_allowed("a"));
    }

    #[test]
    fn test_rejections_are_not_recorded() {
        let (limiter, clock) = limiter(1, 10);
        assert!(limiter.is_allowed("a"));
        for _ in 0..5 {
            clock.advance(TimeDelta::seconds(1));
            assert!(!limiter.is_allowed("a"));
        }
        clock.advance(TimeDelta::seconds(6));
        assert!(limiter.is_allowed("a"));
    }

    #[test]
    fn test_reset_time() {
        let (limiter, clock) = limiter(5, 60);
        assert_eq!(limiter.reset_time("a"), None);
        let start = clock.now();
        limiter.is_allowed("a");
        clock.advance(TimeDelta::seconds(10));
        limiter.is_allowed("a");
        assert_eq!(limiter.reset_time("a"), Some(start + TimeDelta::seconds(60)));

        clock.advance(TimeDelta::seconds(55));
        assert_eq!(
            limiter.reset_time("a"),
            Some(start + TimeDelta::seconds(70))
        );
        clock.advance(TimeDelta::seconds(60));
        assert_eq!(limiter.reset_time("a"), None);
    }

    #[test]
    fn test_stats_count_only_recent() {
        let (limiter, clock) = limiter(10, 60);
        limiter.is_allowed("a");
        limiter.is_allowed("a");
        limiter.is_allowed("b");
        let stats = limiter.stats();
        assert_eq!(stats.active_clients, 2);
        assert_eq!(stats.total_recent_requests, 3);
        assert_eq!(stats.limit, 10);
        assert_eq!(stats.window_secs, 60);

        clock.advance(TimeDelta::seconds(61));
        limiter.is_allowed("c");
        let stats = limiter.stats();
        assert_eq!(stats.active_clients, 1);
        assert_eq!(stats.total_recent_requests, 1);
    }

    #[test]
    fn test_evict_idle_clients() {
        let (limiter, clock) = limiter(10, 60);
        limiter.is_allowed("a");
        limiter.is_allowed("b");
        clock.advance(TimeDelta::seconds(30));
        limiter.is_allowed("b");
        clock.advance(TimeDelta::seconds(31));
        assert_eq!(limiter.tracked_clients(), 2);
        assert_eq!(limiter.evict_idle(), 1);
        assert_eq!(limiter.tracked_clients(), 1);
        assert_eq!(limiter.stats().total_recent_requests, 1);
    }

    #[test]
    fn test_zero_limit_rejects_everything() {
        let (limiter, _) = limiter(0, 60);
        assert!(!limiter.is_allowed("a"));
        assert_eq!(limiter.reset_time("a"), None);
    }

    #[test]
    fn test_concurrent_admissions_never_exceed_limit() {
        let limiter = Arc::new(RateLimiter::new(50, TimeDelta::seconds(60)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || (0..20).filter(|_| limiter.is_allowed("shared")).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }
}
