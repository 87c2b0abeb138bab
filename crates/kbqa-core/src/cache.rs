//! TTL cache for memoizing expensive upstream calls.
//!
//! Each [`TtlCache`] instance has its own default time-to-live; the service
//! runs several side by side (general results, query embeddings, search
//! results). Entries are typed [`CacheEntry`] records carrying expiry and hit
//! accounting.
//!
//! # Expiry
//!
//! An entry is visible only while `now < expires_at`. Expired entries are
//! removed lazily by [`get`](TtlCache::get) or in bulk by
//! [`cleanup_expired`](TtlCache::cleanup_expired). A TTL of zero or less is
//! accepted and produces an entry that is already expired.
//!
//! # Memoization keys
//!
//! [`CacheKey`] fingerprints a logical function name plus its arguments:
//!
//! ```rust
//! use kbqa_core::cache::CacheKey;
//!
//! let a = CacheKey::new("embed").arg("hello").kwarg("model", "small").kwarg("dims", &8).build().unwrap();
//! let b = CacheKey::new("embed").arg("hello").kwarg("dims", &8).kwarg("model", "small").build().unwrap();
//! assert_eq!(a, b);
//! assert!(a.starts_with("embed:"));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::clock::{Clock, SystemClock};

/// Default TTL for general-purpose caches (1 hour).
pub const DEFAULT_TTL_SECS: i64 = 3_600;
/// Default TTL for query embeddings (24 hours).
pub const EMBEDDING_TTL_SECS: i64 = 86_400;
/// Default TTL for search results (30 minutes).
pub const SEARCH_TTL_SECS: i64 = 1_800;

/// Convert whole seconds to a signed TTL, saturating instead of overflowing.
pub fn ttl_from_secs(secs: i64) -> TimeDelta {
    TimeDelta::try_seconds(secs).unwrap_or(if secs < 0 {
        TimeDelta::MIN
    } else {
        TimeDelta::MAX
    })
}

fn expiry(now: DateTime<Utc>, ttl: TimeDelta) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(if ttl < TimeDelta::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// A single cached value and its bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub hits: u64,
}

impl<V> CacheEntry<V> {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_hits: u64,
    /// Entries past expiry that have not been swept yet.
    pub expired_entries: usize,
    /// Rough byte footprint: entry records plus key storage.
    pub memory_estimate: usize,
}

/// Thread-safe key → value cache with per-entry expiry.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    default_ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(default_ttl: TimeDelta) -> Self {
        Self::with_clock(default_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(default_ttl: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
            clock,
        }
    }

    pub fn default_ttl(&self) -> TimeDelta {
        self.default_ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a live entry.
    ///
    /// A hit bumps the entry's hit counter and last-access time; expiry is
    /// unchanged. An expired entry is removed and reported as absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock();
        let expired = entries.get(key)?.is_expired_at(now);
        if expired {
            entries.remove(key);
            debug!(key, "evicted expired cache entry on access");
            return None;
        }
        let entry = entries.get_mut(key)?;
        entry.hits += 1;
        entry.last_accessed = now;
        Some(entry.value.clone())
    }

    /// Store `value` under `key` with the cache's default TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Store `value` under `key`, replacing any existing entry.
    ///
    /// A non-positive `ttl` stores an entry that is already expired.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: TimeDelta) {
        let key = key.into();
        let now = self.clock.now();
        let entry = CacheEntry {
            key: key.clone(),
            value,
            created_at: now,
            expires_at: expiry(now, ttl),
            last_accessed: now,
            hits: 0,
        };
        self.lock().insert(key, entry);
    }

    /// Remove `key`. Returns `true` iff an entry existed.
    pub fn delete(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Sweep all expired entries, returning how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired_at(now));
        before - entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let entries = self.lock();
        let record = std::mem::size_of::<CacheEntry<V>>();
        CacheStats {
            total_entries: entries.len(),
            total_hits: entries.values().map(|e| e.hits).sum(),
            expired_entries: entries.values().filter(|e| e.is_expired_at(now)).count(),
            memory_estimate: entries
                .iter()
                .map(|(k, e)| record + k.len() + e.key.len())
                .sum(),
        }
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    ///
    /// `ttl` of `None` uses the default TTL.
    pub fn get_or_insert_with<F>(&self, key: &str, ttl: Option<TimeDelta>, f: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(v) = self.get(key) {
            return v;
        }
        let value = f();
        self.set_with_ttl(key, value.clone(), ttl.unwrap_or(self.default_ttl));
        value
    }

    /// Async, fallible variant of [`get_or_insert_with`](Self::get_or_insert_with).
    ///
    /// The lock is not held while `f` runs, so concurrent misses on the same
    /// key may both compute; the last one to finish wins. Errors are returned
    /// to the caller and nothing is cached.
    pub async fn get_or_try_insert_with<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<TimeDelta>,
        f: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(v) = self.get(key) {
            return Ok(v);
        }
        let value = f().await?;
        self.set_with_ttl(key, value.clone(), ttl.unwrap_or(self.default_ttl));
        Ok(value)
    }
}

/// Builder for memoization keys of the form `"{function}:{sha256 hex}"`.
///
/// Positional arguments are order-sensitive. Keyword arguments are kept
/// sorted by name, so their insertion order does not change the key.
/// Arguments are serialized with `serde_json`; the first serialization
/// failure is reported by [`build`](CacheKey::build).
#[derive(Debug)]
pub struct CacheKey {
    function: String,
    args: Vec<serde_json::Value>,
    kwargs: BTreeMap<String, serde_json::Value>,
    error: Option<serde_json::Error>,
}

impl CacheKey {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            args: Vec::new(),
            kwargs: BTreeMap::new(),
            error: None,
        }
    }

    pub fn arg<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => self.args.push(v),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    pub fn kwarg<T: Serialize + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => {
                self.kwargs.insert(name.into(), v);
            }
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    pub fn build(self) -> Result<String, serde_json::Error> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let payload = serde_json::to_vec(&Fingerprint {
            args: &self.args,
            kwargs: &self.kwargs,
        })?;
        let mut hasher = Sha256::new();
        hasher.update(&payload);
        Ok(format!("{}:{:x}", self.function, hasher.finalize()))
    }
}

#[derive(Serialize)]
struct Fingerprint<'a> {
    args: &'a [serde_json::Value],
    kwargs: &'a BTreeMap<String, serde_json::Value>,
}
