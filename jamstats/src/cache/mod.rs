//! TTL-classed LRU caches for source records and finished answers.

mod keys;

pub use keys::{answer_key, call_key, raw_query_key};

use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::config::CacheConfig;
use crate::models::{AggregationResult, Answer, Intent, Record, TtlClass};

/// A finished answer with what produced it, so a cache hit can still be
/// recorded as a conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedAnswer {
    pub intent: Intent,
    pub result: AggregationResult,
    pub answer: Answer,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Records(Arc<Vec<Record>>),
    Answer(Arc<CachedAnswer>),
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: CacheValue,
    pub ttl_class: TtlClass,
    pub inserted_at: Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub static_entries: usize,
    pub historical_entries: usize,
    pub recency_entries: usize,
}

type Shard = Arc<Mutex<LruCache<String, CacheEntry>>>;

fn shard(capacity: usize) -> Shard {
    let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
    Arc::new(Mutex::new(LruCache::new(capacity)))
}

fn lock(shard: &Shard) -> MutexGuard<'_, LruCache<String, CacheEntry>> {
    shard.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One LRU per TTL class; capacity pressure in one class never evicts another's entries.
#[derive(Clone)]
pub struct QueryCache {
    static_entries: Shard,
    historical: Shard,
    recency: Shard,
    static_ttl: Duration,
    historical_ttl: Duration,
    recency_ttl: Duration,
}

impl QueryCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            static_entries: shard(config.static_capacity),
            historical: shard(config.historical_capacity),
            recency: shard(config.recency_capacity),
            static_ttl: config.static_ttl(),
            historical_ttl: config.historical_ttl(),
            recency_ttl: config.recency_ttl(),
        }
    }

    fn shard(&self, class: TtlClass) -> &Shard {
        match class {
            TtlClass::Static => &self.static_entries,
            TtlClass::Historical => &self.historical,
            TtlClass::Recency => &self.recency,
        }
    }

    pub fn ttl(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Static => self.static_ttl,
            TtlClass::Historical => self.historical_ttl,
            TtlClass::Recency => self.recency_ttl,
        }
    }

    /// Look `key` up in every class. Expired entries are removed on sight.
    pub fn get(&self, key: &str) -> Option<CacheValue> {
        for class in [TtlClass::Recency, TtlClass::Historical, TtlClass::Static] {
            let ttl = self.ttl(class);
            let mut cache = lock(self.shard(class));
            let Some(entry) = cache.get(key) else {
                continue;
            };
            if entry.inserted_at.elapsed() < ttl {
                tracing::debug!(key, ttl_class = %class, "Cache hit");
                return Some(entry.value.clone());
            }
            cache.pop(key);
            tracing::debug!(key, ttl_class = %class, "Cache entry expired");
            return None;
        }
        tracing::debug!(key, "Cache miss");
        None
    }

    /// Store `value` under `key` in `ttl_class`, replacing any entry for the
    /// same key in another class.
    pub fn put(&self, key: String, value: CacheValue, ttl_class: TtlClass) {
        for class in [TtlClass::Static, TtlClass::Historical, TtlClass::Recency] {
            if class != ttl_class {
                lock(self.shard(class)).pop(&key);
            }
        }
        let entry = CacheEntry {
            value,
            ttl_class,
            inserted_at: Instant::now(),
        };
        lock(self.shard(ttl_class)).put(key, entry);
    }

    pub fn get_records(&self, key: &str) -> Option<Arc<Vec<Record>>> {
        match self.get(key)? {
            CacheValue::Records(records) => Some(records),
            CacheValue::Answer(_) => None,
        }
    }

    pub fn get_answer(&self, key: &str) -> Option<Arc<CachedAnswer>> {
        match self.get(key)? {
            CacheValue::Answer(answer) => Some(answer),
            CacheValue::Records(_) => None,
        }
    }

    /// Drop every entry in `class`, or in every class when `None`. Returns
    /// the number of entries dropped.
    pub fn invalidate(&self, class: Option<TtlClass>) -> usize {
        let classes: &[TtlClass] = match &class {
            Some(class) => std::slice::from_ref(class),
            None => &[TtlClass::Static, TtlClass::Historical, TtlClass::Recency],
        };
        let mut dropped = 0;
        for class in classes {
            let mut cache = lock(self.shard(*class));
            dropped += cache.len();
            cache.clear();
        }
        tracing::info!(ttl_class = ?class, dropped, "Invalidated cache");
        dropped
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            static_entries: lock(&self.static_entries).len(),
            historical_entries: lock(&self.historical).len(),
            recency_entries: lock(&self.recency).len(),
        }
    }
}
