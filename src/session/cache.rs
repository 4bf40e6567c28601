//! Statement cache.
//!
//! Memoises parse + lower + render for a query text. Entries are keyed by the
//! model name and the whitespace-normalised text and evicted least recently
//! used first once `max_entries` is reached.
//!
//! # Configuration
//!
//! - `RELGRAPH_STATEMENT_CACHE_ENABLED` (default: true)
//! - `RELGRAPH_STATEMENT_CACHE_MAX_ENTRIES` (default: 512)
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sha2::{Digest, Sha256};

use super::prepared::PreparedQuery;

/// Key for cache lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatementCacheKey {
    pub normalized_query: String,
    pub model_name: String,
}

impl StatementCacheKey {
    pub fn new(query: &str, model_name: &str) -> Self {
        StatementCacheKey {
            normalized_query: normalize_query(query),
            model_name: model_name.to_string(),
        }
    }

    /// Short SHA-256 digest used to identify the statement in logs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.model_name.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.normalized_query.as_bytes());
        hex::encode(&hasher.finalize()[..8])
    }
}

/// Collapse runs of whitespace into a single space, leaving quoted literals
/// untouched since their text is bound as-is.
fn normalize_query(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    let mut in_literal = false;
    let mut pending_space = false;
    for c in query.chars() {
        if !in_literal && c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        if c == '\'' {
            // `''` inside a literal closes and reopens it
            in_literal = !in_literal;
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone)]
struct CacheEntry {
    prepared: Arc<PreparedQuery>,
    /// Logical clock value of the last access (for LRU)
    last_accessed: u64,
    access_count: u64,
}

/// Statement cache with LRU eviction
#[derive(Debug)]
pub struct StatementCache {
    cache: Arc<Mutex<HashMap<StatementCacheKey, CacheEntry>>>,
    enabled: bool,
    max_entries: usize,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl StatementCache {
    pub fn new(enabled: bool, max_entries: usize) -> Self {
        StatementCache {
            cache: Arc::new(Mutex::new(HashMap::new())),
            enabled,
            max_entries: max_entries.max(1),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<StatementCacheKey, CacheEntry>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    pub fn get(&self, key: &StatementCacheKey) -> Option<Arc<PreparedQuery>> {
        if !self.enabled {
            return None;
        }

        let now = self.tick();
        let mut cache = self.lock();
        if let Some(entry) = cache.get_mut(key) {
            entry.last_accessed = now;
            entry.access_count += 1;
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some(Arc::clone(&entry.prepared))
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// May evict the least recently used entry
    pub fn insert(&self, key: StatementCacheKey, prepared: Arc<PreparedQuery>) {
        if !self.enabled {
            return;
        }

        let entry = CacheEntry {
            prepared,
            last_accessed: self.tick(),
            access_count: 0,
        };
        let mut cache = self.lock();
        if !cache.contains_key(&key) && cache.len() >= self.max_entries {
            self.evict_lru(&mut cache);
        }
        cache.insert(key, entry);
    }

    fn evict_lru(&self, cache: &mut HashMap<StatementCacheKey, CacheEntry>) {
        if let Some(key) = cache
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone())
        {
            cache.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.lock().len(),
            max_entries: self.max_entries,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub max_entries: usize,
}

impl CacheStats {
    /// Cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::prepared::PreparedKind;

    fn prepared(sql: &str) -> Arc<PreparedQuery> {
        Arc::new(PreparedQuery {
            query: sql.to_string(),
            sql: sql.to_string(),
            bindings: Vec::new(),
            kind: PreparedKind::Mutation,
        })
    }

    #[test]
    fn test_key_normalizes_whitespace() {
        let a = StatementCacheKey::new("select o\n  from   Order o", "shop");
        let b = StatementCacheKey::new("select o from Order o", "shop");
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
        assert_ne!(a, StatementCacheKey::new("select o from Order o", "other"));
    }

    #[test]
    fn test_key_keeps_whitespace_inside_literals() {
        let spaced = StatementCacheKey::new("where t.label = 'a  b'", "shop");
        let single = StatementCacheKey::new("where t.label = 'a b'", "shop");
        assert_ne!(spaced, single);
        assert_eq!(spaced.normalized_query, "where t.label = 'a  b'");

        let escaped = StatementCacheKey::new(" where  x = 'it''s  here'  and y = 1 ", "shop");
        assert_eq!(escaped.normalized_query, "where x = 'it''s  here' and y = 1");
    }

    #[test]
    fn test_hits_misses_and_lru_eviction() {
        let cache = StatementCache::new(true, 2);
        let a = StatementCacheKey::new("a", "m");
        let b = StatementCacheKey::new("b", "m");
        let c = StatementCacheKey::new("c", "m");
        assert!(cache.get(&a).is_none());
        cache.insert(a.clone(), prepared("A"));
        cache.insert(b.clone(), prepared("B"));
        // Touch `a` so `b` is the least recently used
        assert_eq!(cache.get(&a).unwrap().sql, "A");
        cache.insert(c.clone(), prepared("C"));
        assert!(cache.get(&b).is_none());
        assert!(cache.get(&c).is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.size, 2);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = StatementCache::new(false, 4);
        let key = StatementCacheKey::new("a", "m");
        cache.insert(key.clone(), prepared("A"));
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.stats().size, 0);
    }
}
