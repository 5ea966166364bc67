use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::config::PlanCacheConfig;
use crate::core::error::{Error, Result};
use crate::query::analyzer::QueryAnalysis;
use crate::query::planner::QueryPlan;

/// Cached analysis + plan for one normalized query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPlan {
    pub analysis: QueryAnalysis,
    pub plan: QueryPlan,
    pub hit_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub evictions: u64,
    pub size: usize,
    pub capacity: usize,
}

/// Size-bounded LRU plan cache with TTL
///
/// Keys are normalized queries so that semantically identical spellings
/// coalesce. Entries never reference graph state, so the cache survives
/// graph mutations and is safe to read concurrently with writes.
pub struct QueryPlanCache {
    entries: Mutex<LruCache<String, CachedPlan>>,
    config: PlanCacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl QueryPlanCache {
    pub fn new(config: PlanCacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_size.max(1)).expect("non-zero capacity");
        QueryPlanCache {
            entries: Mutex::new(LruCache::new(capacity)),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Normalized cache key: lower-cased, whitespace collapsed, boolean
    /// operators case-folded by the lower-casing, trailing punctuation
    /// stripped. Idempotent.
    pub fn normalize(&self, query: &str) -> String {
        if !self.config.normalize_queries {
            return query.to_string();
        }
        normalize_query(query)
    }

    pub fn get(&self, query: &str) -> Option<CachedPlan> {
        let key = self.normalize(query);
        let ttl = Duration::milliseconds(self.config.ttl_ms as i64);
        let mut entries = self.entries.lock();

        let fresh = entries
            .peek(&key)
            .map(|entry| Utc::now() - entry.created_at <= ttl);
        match fresh {
            Some(true) => {
                let entry = entries.get_mut(&key).expect("peeked entry present");
                entry.hit_count += 1;
                entry.last_accessed = Utc::now();
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.clone())
            }
            Some(false) => {
                // expired; remove so the slot frees up
                entries.pop(&key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, query: &str, analysis: QueryAnalysis, plan: QueryPlan) {
        let key = self.normalize(query);
        let now = Utc::now();
        let entry = CachedPlan {
            analysis,
            plan,
            hit_count: 0,
            created_at: now,
            last_accessed: now,
        };
        let mut entries = self.entries.lock();
        if let Some((displaced_key, _)) = entries.push(key.clone(), entry) {
            // push returns the same key on replacement, another on eviction
            if displaced_key != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Remove entries whose normalized key contains `pattern`
    pub fn invalidate_matching(&self, pattern: &str) -> usize {
        let pattern = pattern.to_lowercase();
        let mut entries = self.entries.lock();
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.contains(&pattern))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Serialize all live entries for transfer between processes
    pub fn export(&self) -> Result<String> {
        let entries = self.entries.lock();
        let snapshot: Vec<(String, CachedPlan)> = entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect();
        serde_json::to_string(&snapshot).map_err(|e| Error::backend("plan-cache", e))
    }

    /// Load previously exported entries; returns how many were imported
    pub fn import(&self, payload: &str) -> Result<usize> {
        let snapshot: Vec<(String, CachedPlan)> =
            serde_json::from_str(payload).map_err(|e| Error::Validation(e.to_string()))?;
        let count = snapshot.len();
        let mut entries = self.entries.lock();
        // oldest first so recency order is preserved on refill
        for (key, entry) in snapshot.into_iter().rev() {
            entries.push(key, entry);
        }
        Ok(count)
    }

    pub fn stats(&self) -> PlanCacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        PlanCacheStats {
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.entries.lock().len(),
            capacity: self.config.max_size,
        }
    }
}

/// Lower-case, collapse whitespace, strip trailing punctuation
pub fn normalize_query(query: &str) -> String {
    let collapsed = query
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    collapsed
        .trim_end_matches(['.', '?', '!', ',', ';', ':'])
        .trim_end()
        .to_string()
}
