//! Periodic cleanup of expired cache entries and idle rate-limit clients.
//!
//! Lazy eviction only touches keys and clients that are accessed again.
//! The sweeper bounds memory for everything else by running
//! [`TtlCache::cleanup_expired`](kbqa_core::TtlCache::cleanup_expired) and
//! [`RateLimiter::evict_idle`](kbqa_core::RateLimiter::evict_idle) on a fixed
//! interval.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::services::Services;

/// What a single sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_entries: usize,
    pub idle_clients: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired_entries == 0 && self.idle_clients == 0
    }
}

/// Run one sweep over every cache and limiter.
pub fn sweep(services: &Services) -> SweepReport {
    let expired_entries = services.cache.cleanup_expired()
        + services.embedding_cache.cleanup_expired()
        + services.search_cache.cleanup_expired();
    let idle_clients =
        services.upload_limiter.evict_idle() + services.general_limiter.evict_idle();

    let report = SweepReport {
        expired_entries,
        idle_clients,
    };
    if report.is_empty() {
        debug!("maintenance sweep found nothing to remove");
    } else {
        info!(expired_entries, idle_clients, "maintenance sweep");
    }
    report
}

/// Spawn a background task that sweeps every `interval`.
///
/// The first sweep runs one full interval after spawning. Abort the returned
/// handle to stop it.
pub fn spawn_sweeper(services: Services, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // `interval` fires immediately on the first tick.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep(&services);
        }
    })
}
