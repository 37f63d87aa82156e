//! TTL-based in-memory cache for API responses.
//!
//! The cache is bounded by aggregate entry size and entry count. When either
//! bound would be exceeded, entries are evicted in ascending insertion order
//! (oldest `stored_at` first) — insertion-order eviction, not recency-of-access.
//! Per-key TTL is resolved by matching the request path embedded in the cache
//! key against a [`PathTrie`] of overrides; an override of zero means the
//! endpoint is never cached.
//!
//! Expiry is both lazy (an expired entry is removed by the `get` that finds
//! it) and active (a background sweep task removes expired entries nobody
//! reads again).
//!
//! # Concurrency
//!
//! All state lives behind a single `tokio::sync::RwLock`, so every operation
//! is atomic with respect to other cache operations. There is no cross-key
//! transaction: two concurrent misses for the same key may both fill it, and
//! the last write wins. Size bookkeeping is exact under the lock but callers
//! should treat it as an approximate capacity signal, not an accounting
//! guarantee.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::path_trie::PathTrie;

/// Size charged to an entry whose value cannot be JSON-serialized.
const FALLBACK_ENTRY_SIZE: usize = 1024;

/// Endpoint families that must never be served from cache.
const NEVER_CACHE_PATTERNS: &[&str] = &[
    "/amc/application-manager/api/v2/organizations/*/environments/*/deployments/*/specs/*/logs",
];

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for [`TtlCache`].
///
/// # Example (TOML)
///
/// ```toml
/// [cache]
/// entry_ttl = "60s"
/// max_size = 52428800
/// max_entries = 1000
/// cleanup_interval = "5m"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Default TTL for entries whose key matches no registered override.
    #[serde(with = "humantime_serde")]
    pub entry_ttl: Duration,

    /// Maximum aggregate size of all entries, in approximate bytes.
    pub max_size: usize,

    /// Maximum number of entries.
    pub max_entries: usize,

    /// Interval between background sweeps of expired entries.
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entry_ttl: Duration::from_secs(60),         // 60 seconds
            max_size: 50 * 1024 * 1024,                 // 50 MiB
            max_entries: 1000,                          // 1000 entries
            cleanup_interval: Duration::from_secs(300), // 5 minutes
        }
    }
}

impl CacheConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default entry TTL.
    #[must_use]
    pub fn with_entry_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }

    /// Sets the maximum aggregate size in bytes.
    #[must_use]
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Sets the maximum entry count.
    #[must_use]
    pub fn with_max_entries(mut self, entries: usize) -> Self {
        self.max_entries = entries;
        self
    }

    /// Sets the background sweep interval.
    #[must_use]
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}

// =============================================================================
// Cache Entry and Inner State
// =============================================================================

/// A single cached value with its expiry metadata.
#[derive(Debug)]
struct CacheEntry<T> {
    /// The cached value.
    data: T,
    /// When the entry was inserted.
    stored_at: Instant,
    /// How long the entry stays valid after insertion.
    ttl: Duration,
    /// Approximate byte cost, used for capacity accounting only.
    size: usize,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) > self.ttl
    }
}

/// Mutable cache state behind the lock.
struct CacheInner<T> {
    entries: HashMap<String, CacheEntry<T>>,
    /// Running sum of `entry.size` across all entries.
    current_size: usize,
    hits: u64,
    misses: u64,
}

impl<T> CacheInner<T> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            current_size: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Removes an entry and decrements the aggregate size.
    fn remove_entry(&mut self, key: &str) -> bool {
        if let Some(entry) = self.entries.remove(key) {
            self.current_size = self.current_size.saturating_sub(entry.size);
            true
        } else {
            false
        }
    }

    /// Keys of all entries in ascending insertion order.
    fn keys_oldest_first(&self) -> Vec<String> {
        let mut keyed: Vec<(&String, Instant)> = self
            .entries
            .iter()
            .map(|(k, e)| (k, e.stored_at))
            .collect();
        keyed.sort_by_key(|&(_, stored_at)| stored_at);
        keyed.into_iter().map(|(k, _)| k.clone()).collect()
    }

    fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// =============================================================================
// Cache Statistics
// =============================================================================

/// A point-in-time snapshot of cache state and lookup accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    /// Total number of entries, including expired-but-not-yet-swept ones.
    pub total_entries: usize,

    /// Number of entries whose TTL has not lapsed.
    pub valid_entries: usize,

    /// Number of expired entries awaiting removal by sweep or lookup.
    pub expired_entries: usize,

    /// Current aggregate size in approximate bytes.
    pub current_size: usize,

    /// Configured maximum aggregate size.
    pub max_size: usize,

    /// `hits / (hits + misses)`, or `0.0` before any lookup.
    pub hit_rate: f64,
}

// =============================================================================
// TTL Cache
// =============================================================================

/// TTL-, size- and count-bounded in-memory cache.
///
/// Must be created inside a Tokio runtime: construction spawns the background
/// sweep task. The task holds only a [`Weak`] reference to the cache state and
/// exits on its own once the cache is dropped; [`TtlCache::destroy`] stops it
/// immediately.
pub struct TtlCache<T> {
    inner: Arc<RwLock<CacheInner<T>>>,
    /// Per-path TTL overrides, built once and read-only afterwards.
    overrides: PathTrie<Duration>,
    config: CacheConfig,
    sweep: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<T> TtlCache<T>
where
    T: Clone + Serialize + Send + Sync + 'static,
{
    /// Creates a cache with the built-in TTL overrides (deployment log
    /// endpoints are never cached).
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        let mut overrides = PathTrie::new();
        for pattern in NEVER_CACHE_PATTERNS {
            overrides.insert(pattern, Duration::ZERO);
        }
        Self::with_overrides(config, overrides)
    }

    /// Creates a cache with a caller-built set of TTL overrides.
    #[must_use]
    pub fn with_overrides(config: CacheConfig, overrides: PathTrie<Duration>) -> Self {
        let inner = Arc::new(RwLock::new(CacheInner::new()));
        let sweep = spawn_sweep(Arc::downgrade(&inner), config.cleanup_interval);

        Self {
            inner,
            overrides,
            config,
            sweep: std::sync::Mutex::new(Some(sweep)),
        }
    }

    /// Inserts `value` under `key`, replacing any existing entry.
    ///
    /// The entry's TTL is resolved from the path component of the key; an
    /// override of zero makes the entry immediately stale. Eviction runs
    /// before insertion: size-bounded eviction removes oldest-inserted entries
    /// until the new entry fits, then the count bound removes the single
    /// oldest entry when at capacity.
    pub async fn set(&self, key: &str, value: T) {
        let ttl = self.resolve_ttl(key);
        let size = estimate_size(&value);

        let mut inner = self.inner.write().await;

        // Replace-by-removal so the aggregate size stays consistent.
        inner.remove_entry(key);

        ensure_space(&mut inner, size, self.config.max_size);
        ensure_entry_limit(&mut inner, self.config.max_entries);

        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                data: value,
                stored_at: Instant::now(),
                ttl,
                size,
            },
        );
        inner.current_size += size;

        tracing::trace!(key, size, ttl_ms = ttl.as_millis() as u64, "cache set");
    }

    /// Looks up `key`, returning a clone of the cached value.
    ///
    /// An expired entry counts as a miss and is removed on the spot.
    pub async fn get(&self, key: &str) -> Option<T> {
        let mut inner = self.inner.write().await;

        let Some(entry) = inner.entries.get(key) else {
            inner.misses += 1;
            return None;
        };

        if entry.is_expired(Instant::now()) {
            inner.remove_entry(key);
            inner.misses += 1;
            return None;
        }

        inner.hits += 1;
        Some(inner.entries[key].data.clone())
    }

    /// Removes the entry under `key`, returning whether one existed.
    pub async fn remove(&self, key: &str) -> bool {
        let mut inner = self.inner.write().await;
        inner.remove_entry(key)
    }

    /// Removes all entries. Hit/miss counters survive.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.current_size = 0;
        tracing::debug!("cache cleared");
    }

    /// Returns a snapshot of cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        let now = Instant::now();

        let mut valid_entries = 0;
        let mut expired_entries = 0;
        for entry in inner.entries.values() {
            if entry.is_expired(now) {
                expired_entries += 1;
            } else {
                valid_entries += 1;
            }
        }

        CacheStats {
            total_entries: inner.entries.len(),
            valid_entries,
            expired_entries,
            current_size: inner.current_size,
            max_size: self.config.max_size,
            hit_rate: inner.hit_rate(),
        }
    }

    /// Stops the background sweep and removes all entries.
    pub async fn destroy(&self) {
        if let Some(handle) = lock_sweep(&self.sweep).take() {
            handle.abort();
        }
        self.clear().await;
        tracing::debug!("cache destroyed");
    }

    /// Resolves the TTL for a cache key.
    ///
    /// Keys are `{org}:{METHOD}:{path+query}:{headers}`; the path field is
    /// stripped of its query string and matched against the override trie.
    fn resolve_ttl(&self, key: &str) -> Duration {
        let request_uri = key.splitn(4, ':').nth(2);
        if let Some(uri) = request_uri
            && !uri.is_empty()
        {
            let path = uri.split('?').next().unwrap_or(uri);
            if let Some(m) = self.overrides.search(path) {
                return *m.value;
            }
        }
        self.config.entry_ttl
    }
}

impl<T> Drop for TtlCache<T> {
    fn drop(&mut self) {
        // The sweep task would exit anyway once its Weak fails to upgrade,
        // but aborting here releases the timer without waiting for a tick.
        if let Some(handle) = lock_sweep(&self.sweep).take() {
            handle.abort();
        }
    }
}

fn lock_sweep<'a>(
    sweep: &'a std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
) -> std::sync::MutexGuard<'a, Option<tokio::task::JoinHandle<()>>> {
    sweep.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Approximate byte cost of a value: JSON-encoded length doubled to account
/// for wide-character storage. Falls back to a fixed cost when serialization
/// fails.
fn estimate_size<T: Serialize>(value: &T) -> usize {
    serde_json::to_string(value)
        .map(|s| s.len() * 2)
        .unwrap_or(FALLBACK_ENTRY_SIZE)
}

/// Evicts oldest-inserted entries until `new_entry_size` fits under `max_size`.
fn ensure_space<T>(inner: &mut CacheInner<T>, new_entry_size: usize, max_size: usize) {
    if inner.current_size + new_entry_size <= max_size {
        return;
    }

    let mut evicted = 0usize;
    for key in inner.keys_oldest_first() {
        inner.remove_entry(&key);
        evicted += 1;
        if inner.current_size + new_entry_size <= max_size {
            break;
        }
    }

    if evicted > 0 {
        tracing::debug!(evicted, "evicted entries to make room by size");
    }
}

/// Evicts the single oldest entry when the cache is at its entry cap.
fn ensure_entry_limit<T>(inner: &mut CacheInner<T>, max_entries: usize) {
    if inner.entries.len() < max_entries {
        return;
    }

    if let Some(oldest) = inner.keys_oldest_first().into_iter().next() {
        inner.remove_entry(&oldest);
        tracing::debug!(key = %oldest, "evicted oldest entry at entry cap");
    }
}

/// Spawns the background sweep task.
///
/// The task holds a `Weak` to the cache state so it never keeps the cache
/// alive; it exits at the first tick after the cache is dropped.
fn spawn_sweep<T>(
    inner: Weak<RwLock<CacheInner<T>>>,
    interval: Duration,
) -> tokio::task::JoinHandle<()>
where
    T: Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The immediate first tick would sweep an empty cache.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(inner) = inner.upgrade() else {
                break;
            };

            let mut inner = inner.write().await;
            let now = Instant::now();
            let expired: Vec<String> = inner
                .entries
                .iter()
                .filter(|(_, e)| e.is_expired(now))
                .map(|(k, _)| k.clone())
                .collect();

            let removed = expired.len();
            for key in expired {
                inner.remove_entry(&key);
            }

            if removed > 0 {
                tracing::debug!(removed, "swept expired cache entries");
            }
        }
    })
}

// =============================================================================
// Tests
// =============================================================================
