use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::core::config::ResultCacheConfig;
use crate::search::filter::{Page, SearchFilter};
use crate::search::results::SearchResults;

/// Result cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU + TTL result cache, one instance per retrieval kind
///
/// Keys embed the graph generation counter, so any mutation forces a miss
/// even when the entity population returns to a previous size. The event
/// bus additionally clears the cache outright on create/update/delete.
/// When `cleanup_at_half` is set, hitting capacity evicts down to 50%
/// (the fuzzy cache's mid-life cleanup).
pub struct SearchCache {
    entries: Mutex<LruCache<String, (Instant, SearchResults)>>,
    ttl: Duration,
    capacity: usize,
    cleanup_at_half: bool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SearchCache {
    pub fn new(config: ResultCacheConfig) -> Self {
        Self::with_capacity(config.size, config.ttl_ms, false)
    }

    pub fn with_capacity(size: usize, ttl_ms: u64, cleanup_at_half: bool) -> Self {
        let capacity = size.max(1);
        SearchCache {
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).expect("non-zero capacity"),
            )),
            ttl: Duration::from_millis(ttl_ms),
            capacity,
            cleanup_at_half,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Canonical JSON cache key; tags sorted so equivalent filters coalesce
    pub fn key(
        kind: &str,
        query: &str,
        filter: &SearchFilter,
        page: Page,
        generation: u64,
    ) -> String {
        let mut tags = filter.tags.clone();
        tags.sort();
        json!({
            "kind": kind,
            "query": query,
            "tags": tags,
            "min_importance": filter.min_importance,
            "max_importance": filter.max_importance,
            "entity_type": filter.entity_type,
            "created_after": filter.created_after,
            "created_before": filter.created_before,
            "modified_after": filter.modified_after,
            "modified_before": filter.modified_before,
            "offset": page.offset,
            "limit": page.limit,
            "generation": generation,
        })
        .to_string()
    }

    pub fn get(&self, key: &str) -> Option<SearchResults> {
        let mut entries = self.entries.lock();
        let fresh = entries
            .peek(key)
            .map(|(inserted, _)| inserted.elapsed() <= self.ttl);
        match fresh {
            Some(true) => {
                let (_, results) = entries.get(key).expect("peeked entry present");
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(results.clone())
            }
            Some(false) => {
                entries.pop(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, key: String, results: SearchResults) {
        let mut entries = self.entries.lock();
        if self.cleanup_at_half && entries.len() >= self.capacity {
            let target = self.capacity / 2;
            while entries.len() > target {
                entries.pop_lru();
            }
        }
        entries.push(key, (Instant::now(), results));
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.entries.lock().len(),
            capacity: self.capacity,
        }
    }
}
