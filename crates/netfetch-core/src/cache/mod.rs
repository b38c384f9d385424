//! Response cache (SPEC_FULL §4.7): SHA-256 fingerprint key, LRU eviction by `accessed_at`,
//! TTL expiration, background sweeper.

mod entry;
mod sweeper;

pub use entry::{fingerprint, now_unix as entry_now_unix, CacheEntry};
pub use sweeper::spawn_sweeper;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use entry::now_unix;

/// Point-in-time cache counters, computed from the live maps.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub size: usize,
    pub max_size: usize,
    pub total_hits: u64,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cache: {}/{} bytes, {} entries, {} total hits",
            self.size, self.max_size, self.entries, self.total_hits
        )
    }
}

/// SHA-256 keyed response cache with LRU-by-access-time eviction and TTL expiration.
///
/// The entries map is a `DashMap` for lock-free concurrent reads; `current_size` is tracked
/// under its own mutex so `set`/`evict_lru` serialize against each other without blocking
/// readers on an unrelated key.
pub struct ResponseCache {
    entries: DashMap<String, Arc<CacheEntry>>,
    current_size: Mutex<usize>,
    max_size: usize,
    default_ttl_secs: u64,
    total_hits: AtomicU64,
}

impl ResponseCache {
    pub fn new(max_size: usize, default_ttl_secs: u64) -> Arc<Self> {
        Arc::new(ResponseCache {
            entries: DashMap::new(),
            current_size: Mutex::new(0),
            max_size,
            default_ttl_secs,
            total_hits: AtomicU64::new(0),
        })
    }

    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry>> {
        let now = now_unix();
        let entry = self.entries.get(key)?.clone();
        if entry.is_expired(now) {
            drop(entry);
            self.delete(key);
            return None;
        }
        self.total_hits.fetch_add(1, Ordering::Relaxed);

        let mut updated = (*entry).clone();
        updated.accessed_at = now;
        updated.hit_count += 1;
        let updated = Arc::new(updated);
        self.entries.insert(key.to_string(), updated.clone());
        Some(updated)
    }

    pub fn set(
        &self,
        key: String,
        body: bytes::Bytes,
        headers: Vec<(String, String)>,
        status: u16,
        ttl_secs: Option<u64>,
    ) {
        let now = now_unix();
        let ttl = ttl_secs.unwrap_or(self.default_ttl_secs);
        let entry = CacheEntry {
            key: key.clone(),
            body,
            headers,
            status,
            created_at: now,
            expires_at: if ttl > 0 { now + ttl } else { 0 },
            accessed_at: now,
            hit_count: 0,
        };
        let entry_size = entry.size();

        let mut size_guard = self.current_size.lock();
        if *size_guard + entry_size > self.max_size {
            self.evict_lru_locked(&mut size_guard, entry_size);
        }
        if let Some(old) = self.entries.insert(key, Arc::new(entry)) {
            *size_guard = size_guard.saturating_sub(old.size());
        }
        *size_guard += entry_size;
    }

    pub fn delete(&self, key: &str) {
        if let Some((_, old)) = self.entries.remove(key) {
            let mut size_guard = self.current_size.lock();
            *size_guard = size_guard.saturating_sub(old.size());
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
        *self.current_size.lock() = 0;
    }

    /// Removes all expired entries; used by the background sweeper.
    pub fn sweep_expired(&self) {
        let now = now_unix();
        let expired: Vec<String> =
            self.entries.iter().filter(|e| e.value().is_expired(now)).map(|e| e.key().clone()).collect();
        for key in expired {
            self.delete(&key);
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            size: *self.current_size.lock(),
            max_size: self.max_size,
            total_hits: self.total_hits.load(Ordering::Relaxed),
        }
    }

    fn evict_lru_locked(&self, size_guard: &mut usize, needed: usize) {
        let mut candidates: Vec<(String, u64, usize)> =
            self.entries.iter().map(|e| (e.key().clone(), e.value().accessed_at, e.value().size())).collect();
        candidates.sort_by_key(|(_, accessed_at, _)| *accessed_at);

        for (key, _, size) in candidates {
            if *size_guard + needed <= self.max_size {
                break;
            }
            self.entries.remove(&key);
            *size_guard = size_guard.saturating_sub(size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> Arc<ResponseCache> {
        ResponseCache::new(100, 60)
    }

    #[test]
    fn set_then_get_returns_stored_value() {
        let cache = cache();
        cache.set("k".into(), bytes::Bytes::from_static(b"v"), vec![], 200, None);
        let entry = cache.get("k").unwrap();
        assert_eq!(entry.body.as_ref(), b"v");
        assert_eq!(entry.hit_count, 1);
    }

    #[test]
    fn get_miss_on_absent_key() {
        assert!(cache().get("missing").is_none());
    }

    #[test]
    fn expired_entry_is_a_miss_and_is_removed() {
        let cache = cache();
        cache.set("k".into(), bytes::Bytes::new(), vec![], 200, Some(0));
        // ttl of 0 means "never expires" per entry::is_expired semantics (expires_at stays 0),
        // so force an already-past expiry directly to exercise the sweep path.
        cache.entries.alter("k", |_, mut e| {
            let mut new = (*e).clone();
            new.expires_at = 1;
            e = Arc::new(new);
            e
        });
        assert!(cache.get("k").is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn lru_eviction_with_100_byte_cache_evicts_first_of_three_40_byte_entries() {
        let cache = ResponseCache::new(100, 0);
        cache.set("a".into(), bytes::Bytes::from(vec![0u8; 40]), vec![], 200, None);
        cache.set("b".into(), bytes::Bytes::from(vec![0u8; 40]), vec![], 200, None);
        // Backdate accessed_at directly rather than sleeping: accessed_at has second
        // granularity, so a real sleep-based test would need >1s per entry.
        bump_accessed_at(&cache, "a", 1);
        bump_accessed_at(&cache, "b", 2);
        cache.set("c".into(), bytes::Bytes::from(vec![0u8; 40]), vec![], 200, None);
        bump_accessed_at(&cache, "c", 3);

        assert!(cache.get("a").is_none(), "oldest entry should have been evicted");
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    fn bump_accessed_at(cache: &ResponseCache, key: &str, accessed_at: u64) {
        cache.entries.alter(key, |_, e| {
            let mut new = (*e).clone();
            new.accessed_at = accessed_at;
            Arc::new(new)
        });
    }

    #[test]
    fn accessing_an_entry_protects_it_from_eviction() {
        let cache = ResponseCache::new(100, 0);
        cache.set("a".into(), bytes::Bytes::from(vec![0u8; 40]), vec![], 200, None);
        cache.set("b".into(), bytes::Bytes::from(vec![0u8; 40]), vec![], 200, None);
        bump_accessed_at(&cache, "a", 1);
        bump_accessed_at(&cache, "b", 2);
        // Touch "a" so it becomes the most recently accessed.
        bump_accessed_at(&cache, "a", 3);
        cache.set("c".into(), bytes::Bytes::from(vec![0u8; 40]), vec![], 200, None);

        assert!(cache.get("a").is_some(), "recently touched entry should survive");
        assert!(cache.get("b").is_none(), "untouched older entry should be evicted");
    }

    #[test]
    fn eviction_needing_more_than_one_slot_keeps_size_within_max() {
        let cache = ResponseCache::new(100, 0);
        cache.set("a".into(), bytes::Bytes::from(vec![0u8; 50]), vec![], 200, None);
        cache.set("b".into(), bytes::Bytes::from(vec![0u8; 50]), vec![], 200, None);
        bump_accessed_at(&cache, "a", 1);
        bump_accessed_at(&cache, "b", 2);
        cache.set("c".into(), bytes::Bytes::from(vec![0u8; 60]), vec![], 200, None);

        assert!(cache.get("a").is_none(), "oldest entry should have been evicted");
        assert!(cache.get("b").is_none(), "second-oldest entry must also be evicted to fit 60 bytes");
        assert!(cache.get("c").is_some());
        assert!(cache.stats().size <= 100, "cache must not exceed max_size after eviction");
    }

    #[test]
    fn clear_resets_size_and_entries() {
        let cache = cache();
        cache.set("k".into(), bytes::Bytes::from_static(b"v"), vec![], 200, None);
        cache.clear();
        let stats = cache.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.size, 0);
    }
}
