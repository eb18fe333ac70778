// src/cache.rs
//! Bounded, TTL-aware in-memory store of enriched records.
//!
//! One mutex guards all mutation so the size invariant (`len <= capacity`)
//! holds under concurrent writes. Staleness is decided at read time; there is
//! no sweeper and no per-key delete — an entry is either overwritten by a
//! refresh or evicted under capacity pressure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

use crate::service::EnrichedRecord;

/// Deterministic key for a source URL or raw text: lowercase hex SHA-256 of
/// the trimmed input. Case/whitespace normalization beyond trimming is the
/// caller's responsibility.
pub fn cache_key(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.trim().as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub stored_at: DateTime<Utc>,
    pub record: EnrichedRecord,
}

impl CacheEntry {
    /// Listing order: the document's own publish date when present, else the
    /// cache write time.
    pub fn creation_date(&self) -> DateTime<Utc> {
        self.record.date.unwrap_or(self.stored_at)
    }
}

#[derive(Debug)]
pub struct ArticleCache {
    inner: Mutex<HashMap<String, CacheEntry>>,
    capacity: usize,
}

impl ArticleCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(g) => g.len(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// O(1) lookup, no side effects.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        match self.inner.lock() {
            Ok(g) => g.get(key).cloned(),
            Err(_) => None,
        }
    }

    /// Upsert, then evict oldest-`stored_at` entries (ties broken by key)
    /// until the size invariant holds. A poisoned lock degrades to "no caching
    /// for this call" and never fails the request.
    pub fn put(&self, key: &str, record: EnrichedRecord, now: DateTime<Utc>) {
        let Ok(mut g) = self.inner.lock() else {
            warn!(key, "cache write skipped: lock poisoned");
            return;
        };
        g.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                stored_at: now,
                record,
            },
        );
        Self::evict_to_capacity(&mut g, self.capacity);
    }

    /// `now - stored_at > ttl`. Monotonic in `now`.
    pub fn is_stale(entry: &CacheEntry, now: DateTime<Utc>, ttl: Duration) -> bool {
        let age = now.signed_duration_since(entry.stored_at);
        age.num_milliseconds().max(0) as u128 > ttl.as_millis()
    }

    /// Snapshot ordered by creation date descending, with offset/limit
    /// pagination. Returns `(total, page)`.
    pub fn list(&self, limit: usize, offset: usize) -> (usize, Vec<CacheEntry>) {
        let mut all: Vec<CacheEntry> = match self.inner.lock() {
            Ok(g) => g.values().cloned().collect(),
            Err(_) => return (0, Vec::new()),
        };
        all.sort_by(|a, b| {
            b.creation_date()
                .cmp(&a.creation_date())
                .then_with(|| a.key.cmp(&b.key))
        });
        let total = all.len();
        let page = all.into_iter().skip(offset).take(limit).collect();
        (total, page)
    }

    fn evict_to_capacity(map: &mut HashMap<String, CacheEntry>, capacity: usize) {
        while map.len() > capacity {
            let oldest = map
                .values()
                .min_by(|a, b| {
                    a.stored_at
                        .cmp(&b.stored_at)
                        .then_with(|| a.key.cmp(&b.key))
                })
                .map(|e| e.key.clone());
            match oldest {
                Some(k) => {
                    map.remove(&k);
                }
                None => break,
            }
        }
    }

    /// Test-only direct insert that bypasses eviction, for building
    /// over-capacity states.
    #[cfg(test)]
    fn insert_unchecked(&self, key: &str, record: EnrichedRecord, stored_at: DateTime<Utc>) {
        let mut g = self.inner.lock().expect("cache mutex");
        g.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                stored_at,
                record,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(title: &str) -> EnrichedRecord {
        EnrichedRecord {
            title: title.to_string(),
            ..EnrichedRecord::default()
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("timestamp")
    }

    #[test]
    fn key_is_deterministic_and_hex() {
        let a = cache_key("https://example.com/a");
        let b = cache_key("https://example.com/a");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, cache_key("https://example.com/b"));
    }

    #[test]
    fn key_trims_surrounding_whitespace() {
        assert_eq!(cache_key(" x "), cache_key("x"));
    }

    #[test]
    fn get_after_put_returns_equal_record() {
        let cache = ArticleCache::new(10);
        cache.put("k1", record("one"), at(100));
        let entry = cache.get("k1").expect("entry");
        assert_eq!(entry.record.title, "one");
        assert_eq!(entry.stored_at, at(100));
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn eviction_keeps_the_most_recent_entries() {
        let cache = ArticleCache::new(3);
        for i in 0..7 {
            cache.put(&format!("k{i}"), record("r"), at(i));
        }
        assert_eq!(cache.len(), 3);
        // The 3 most recently stored survive.
        for i in 4..7 {
            assert!(cache.get(&format!("k{i}")).is_some(), "k{i} should survive");
        }
        for i in 0..4 {
            assert!(cache.get(&format!("k{i}")).is_none(), "k{i} should be gone");
        }
    }

    #[test]
    fn eviction_tie_breaks_by_key() {
        let cache = ArticleCache::new(2);
        cache.put("b", record("r"), at(0));
        cache.put("a", record("r"), at(0));
        cache.put("c", record("r"), at(1));
        // "a" < "b" at equal stored_at, so "a" goes first.
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn over_capacity_state_is_drained_in_one_put() {
        // Seed two entries past capacity 1, then a single put must restore the
        // invariant by evicting both older entries.
        let cache = ArticleCache::new(1);
        cache.insert_unchecked("t0", record("r"), at(0));
        cache.insert_unchecked("t10", record("r"), at(10));
        cache.put("t20", record("r"), at(20));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("t20").is_some());
    }

    #[test]
    fn overwrite_does_not_grow_the_cache() {
        let cache = ArticleCache::new(2);
        cache.put("k", record("old"), at(0));
        cache.put("k", record("new"), at(5));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k").expect("entry").record.title, "new");
    }

    #[test]
    fn staleness_is_monotonic() {
        let cache = ArticleCache::new(1);
        cache.put("k", record("r"), at(0));
        let entry = cache.get("k").expect("entry");
        let ttl = Duration::from_secs(3600);
        assert!(!ArticleCache::is_stale(&entry, at(3600), ttl));
        assert!(ArticleCache::is_stale(&entry, at(3601), ttl));
        // Once stale, stale at every later instant.
        assert!(ArticleCache::is_stale(&entry, at(1_000_000), ttl));
    }

    #[test]
    fn list_orders_by_publish_date_then_stored_at_desc() {
        let cache = ArticleCache::new(10);

        let mut with_date = record("dated");
        with_date.date = Some(at(5_000));
        cache.put("dated", with_date, at(10));
        cache.put("old-write", record("old"), at(100));
        cache.put("new-write", record("new"), at(200));

        let (total, page) = cache.list(10, 0);
        assert_eq!(total, 3);
        let keys: Vec<&str> = page.iter().map(|e| e.key.as_str()).collect();
        // publish date 5000 > stored_at 200 > stored_at 100
        assert_eq!(keys, vec!["dated", "new-write", "old-write"]);

        let (_, second) = cache.list(1, 1);
        assert_eq!(second[0].key, "new-write");
    }
}
