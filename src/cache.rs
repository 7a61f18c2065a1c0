//! In-memory TTL cache for aggregated results.
//!
//! Keyed by the normalised query (see `SpecQuery::cache_key`). Each entry
//! carries its own TTL so low-confidence results expire sooner than
//! trusted ones. Expired entries are never returned: `get` evicts them
//! lazily, and [`TtlCache::cleanup`] performs an active sweep intended to
//! run on a fixed interval. Purely in-memory — rebuilt on process restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::types::AggregatedResult;

/// One cached result with its expiry bookkeeping.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: AggregatedResult,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    /// Valid iff `now - stored_at < ttl`.
    fn is_valid(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) < self.ttl
    }
}

/// Snapshot of cache occupancy for observability.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of live (non-expired) entries.
    pub size: usize,
    /// Keys of the live entries, sorted for stable output.
    pub keys: Vec<String>,
}

/// Capacity-bounded TTL cache, safe to share across tasks.
///
/// Explicitly constructed and injected into the orchestrator — there is no
/// process-wide singleton, so tests get fresh state per instance.
#[derive(Debug)]
pub struct TtlCache {
    max_entries: usize,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl TtlCache {
    /// Create a cache holding at most `max_entries`, on the system clock.
    pub fn new(max_entries: usize) -> Self {
        Self::with_clock(max_entries, Arc::new(SystemClock))
    }

    /// Create a cache reading time from the given clock.
    pub fn with_clock(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_entries,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a value, treating expired entries as absent.
    ///
    /// An expired entry found here is evicted immediately rather than
    /// waiting for the next sweep.
    pub fn get(&self, key: &str) -> Option<AggregatedResult> {
        let now = self.clock.now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_valid(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                tracing::debug!(key, "evicted expired cache entry on get");
                None
            }
            None => None,
        }
    }

    /// Insert or replace a value with its own TTL.
    ///
    /// At capacity, expired entries are swept first; if the cache is still
    /// full, the oldest entry is evicted.
    pub fn set(&self, key: impl Into<String>, value: AggregatedResult, ttl: Duration) {
        let key = key.into();
        let now = self.clock.now();
        let mut entries = self.lock();

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            entries.retain(|_, entry| entry.is_valid(now));
            if entries.len() >= self.max_entries {
                if let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.stored_at)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&oldest);
                    tracing::debug!(key = %oldest, "evicted oldest cache entry at capacity");
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
                ttl,
            },
        );
    }

    /// Active sweep: remove every expired entry, returning how many were
    /// removed. Intended to run on a fixed interval (e.g. hourly).
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_valid(now));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, "cache sweep removed expired entries");
        }
        removed
    }

    /// Drop every entry, valid or not.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Live entry count and keys. Expired-but-unswept entries are not
    /// counted.
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let entries = self.lock();
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_valid(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        CacheStats {
            size: keys.len(),
            keys,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
