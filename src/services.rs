//! Component wiring.
//!
//! [`Services`] builds every core component from a [`Config`] and hands them
//! out as `Arc`s. There are no process-wide singletons: each call creates an
//! isolated set, so tests can build as many as they need.

use std::sync::Arc;

use kbqa_core::cache::ttl_from_secs;
use kbqa_core::clock::{Clock, SystemClock};
use kbqa_core::embedding::EmbeddingProvider;
use kbqa_core::rate_limit::RateLimiter;
use kbqa_core::retriever::{RateLimits, RetrievalCaches, Retriever};
use kbqa_core::store::{SearchOutcome, StoreStats, VectorStore};
use kbqa_core::{CacheStats, InMemoryVectorStore, RateLimitStats, TtlCache};
use serde::Serialize;

use crate::config::{Config, TierConfig};

/// All long-lived components of one service instance.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<InMemoryVectorStore>,
    /// General-purpose memoization (1 hour by default).
    pub cache: Arc<TtlCache<serde_json::Value>>,
    pub embedding_cache: Arc<TtlCache<Vec<f32>>>,
    pub search_cache: Arc<TtlCache<SearchOutcome>>,
    pub upload_limiter: Arc<RateLimiter>,
    pub general_limiter: Arc<RateLimiter>,
}

/// Point-in-time statistics across every component.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub store: StoreStats,
    pub cache: CacheStats,
    pub embedding_cache: CacheStats,
    pub search_cache: CacheStats,
    pub upload_limiter: RateLimitStats,
    pub general_limiter: RateLimitStats,
}

fn limiter(tier: &TierConfig, clock: &Arc<dyn Clock>) -> Arc<RateLimiter> {
    Arc::new(RateLimiter::with_clock(
        tier.requests_per_window,
        ttl_from_secs(tier.window_secs),
        clock.clone(),
    ))
}

impl Services {
    pub fn from_config(config: &Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build services that all read time from `clock`.
    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(InMemoryVectorStore::with_min_score(config.store.min_score)),
            cache: Arc::new(TtlCache::with_clock(
                ttl_from_secs(config.cache.default_ttl_secs),
                clock.clone(),
            )),
            embedding_cache: Arc::new(TtlCache::with_clock(
                ttl_from_secs(config.cache.embedding_ttl_secs),
                clock.clone(),
            )),
            search_cache: Arc::new(TtlCache::with_clock(
                ttl_from_secs(config.cache.search_ttl_secs),
                clock.clone(),
            )),
            upload_limiter: limiter(&config.rate_limit.upload, &clock),
            general_limiter: limiter(&config.rate_limit.general, &clock),
        }
    }

    /// Compose a [`Retriever`] over these components and `embedder`.
    pub fn retriever<E: EmbeddingProvider>(
        &self,
        embedder: Arc<E>,
    ) -> Retriever<InMemoryVectorStore, E> {
        Retriever::new(
            self.store.clone(),
            embedder,
            RetrievalCaches {
                embeddings: self.embedding_cache.clone(),
                searches: self.search_cache.clone(),
            },
            RateLimits {
                upload: self.upload_limiter.clone(),
                general: self.general_limiter.clone(),
            },
        )
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            store: self.store.stats(),
            cache: self.cache.stats(),
            embedding_cache: self.embedding_cache.stats(),
            search_cache: self.search_cache.stats(),
            upload_limiter: self.upload_limiter.stats(),
            general_limiter: self.general_limiter.stats(),
        }
    }
}
