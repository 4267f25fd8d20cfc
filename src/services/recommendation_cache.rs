use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::RecommendationBatch;

/// One cached batch with its expiry window
#[derive(Debug, Clone)]
struct CacheEntry {
    batch: RecommendationBatch,
    created_at: DateTime<Utc>,
    ttl_seconds: i64,
}

impl CacheEntry {
    /// An entry is visible while now <= created_at + ttl.
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.created_at + Duration::seconds(self.ttl_seconds)
    }
}

#[derive(Default)]
struct CategoryStore {
    entries: HashMap<String, CacheEntry>,
    /// Insertion order, oldest at the front; drives capacity eviction
    order: VecDeque<String>,
}

/// Counters exposed on the cache stats endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub categories: HashMap<String, usize>,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired_removed: u64,
}

/// Thread-safe recommendation cache with per-entry TTL and a per-category
/// capacity bound.
///
/// Entries rotate on a fixed publish schedule, so eviction is plain FIFO on
/// insertion order. Expiry is lazy on read plus a periodic sweep driven by
/// the maintenance job.
#[derive(Clone)]
pub struct RecommendationCache {
    categories: Arc<DashMap<String, Mutex<CategoryStore>>>,
    capacity_per_category: usize,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    evictions: Arc<AtomicU64>,
    expired_removed: Arc<AtomicU64>,
}

impl RecommendationCache {
    pub fn new(capacity_per_category: usize) -> Self {
        Self {
            categories: Arc::new(DashMap::new()),
            capacity_per_category: capacity_per_category.max(1),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            evictions: Arc::new(AtomicU64::new(0)),
            expired_removed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish a batch under `category`/`key`, replacing any previous entry
    /// for the same key and evicting the oldest entries beyond capacity.
    pub fn set(&self, category: &str, key: &str, batch: RecommendationBatch, ttl_seconds: i64) {
        self.insert_entry(
            category,
            key,
            CacheEntry {
                batch,
                created_at: Utc::now(),
                ttl_seconds,
            },
        );
    }

    /// Read a batch if present and not expired. Expired entries are removed
    /// on the way out and count as misses.
    pub fn get(&self, category: &str, key: &str) -> Option<RecommendationBatch> {
        let Some(category_store) = self.categories.get(category) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        let mut store = category_store.lock();
        let now = Utc::now();

        let expired = match store.entries.get(key) {
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => {
                let batch = entry.batch.clone();
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(batch);
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if expired {
            store.entries.remove(key);
            store.order.retain(|k| k.as_str() != key);
            self.expired_removed.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Drop one entry. Returns whether it existed.
    pub fn invalidate(&self, category: &str, key: &str) -> bool {
        if let Some(category_store) = self.categories.get(category) {
            let mut store = category_store.lock();
            if store.entries.remove(key).is_some() {
                store.order.retain(|k| k.as_str() != key);
                return true;
            }
        }
        false
    }

    /// Sweep every category and drop entries past their TTL. Returns how
    /// many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut removed = 0;

        for category_store in self.categories.iter() {
            let mut store = category_store.lock();
            let CategoryStore { entries, order } = &mut *store;

            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired(now));
            let removed_here = before - entries.len();

            if removed_here > 0 {
                order.retain(|k| entries.contains_key(k));
                removed += removed_here;
            }
        }

        if removed > 0 {
            self.expired_removed.fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let categories = self
            .categories
            .iter()
            .map(|store| (store.key().clone(), store.lock().entries.len()))
            .collect();

        CacheStats {
            categories,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expired_removed: self.expired_removed.load(Ordering::Relaxed),
        }
    }

    fn insert_entry(&self, category: &str, key: &str, entry: CacheEntry) {
        let category_store = self.categories.entry(category.to_string()).or_default();
        let mut store = category_store.lock();

        if store.entries.insert(key.to_string(), entry).is_some() {
            // Re-publish of an existing key refreshes its position
            store.order.retain(|k| k.as_str() != key);
        }
        store.order.push_back(key.to_string());

        while store.entries.len() > self.capacity_per_category {
            match store.order.pop_front() {
                Some(oldest) => {
                    store.entries.remove(&oldest);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                None => break,
            }
        }
    }

    #[cfg(test)]
    fn set_with_created_at(
        &self,
        category: &str,
        key: &str,
        batch: RecommendationBatch,
        ttl_seconds: i64,
        created_at: DateTime<Utc>,
    ) {
        self.insert_entry(
            category,
            key,
            CacheEntry {
                batch,
                created_at,
                ttl_seconds,
            },
        );
    }
}
