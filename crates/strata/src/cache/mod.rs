//! Local in-process LRU cache
//!
//! A bounded recency cache sitting in front of the fast tier. Entries are
//! never authoritative: absence says nothing about existence elsewhere, and
//! presence is only a shortcut for data already verified against a tier.
//!
//! Two disjoint key namespaces share one eviction pool: a marker namespace
//! flagging keys recently declared hot by their producer, and a value
//! namespace holding actual retrieved payloads.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use lru::LruCache;

/// Default maximum number of entries across both namespaces
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    /// Hot-flag namespace: key was recently flagged hot on the write path
    Hot(String),
    /// Value namespace: cached payload from a fast-tier read
    Value(String),
}

#[derive(Debug, Clone)]
enum CacheEntry {
    Marker,
    Value(serde_json::Value),
}

type Pool = Mutex<LruCache<CacheKey, CacheEntry>>;

/// The capability variant, fixed at construction
#[derive(Debug)]
enum Variant {
    Enabled(Pool),
    Disabled,
}

/// Bounded LRU cache with an enabled and a disabled variant.
///
/// The variant is chosen once at construction; callers hold a `LocalCache`
/// and never branch on which one backs it. The disabled variant always
/// misses and never stores.
#[derive(Debug)]
pub struct LocalCache {
    variant: Variant,
}

impl LocalCache {
    /// Create a cache with the given capacity, or the disabled variant when
    /// `enabled` is false or the capacity is zero.
    pub fn new(enabled: bool, capacity: usize) -> Self {
        let variant = match (enabled, NonZeroUsize::new(capacity)) {
            (true, Some(cap)) => Variant::Enabled(Mutex::new(LruCache::new(cap))),
            _ => Variant::Disabled,
        };
        Self { variant }
    }

    /// Create an enabled cache with the default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(true, DEFAULT_CACHE_CAPACITY)
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.variant, Variant::Enabled(_))
    }

    /// Flag a key as recently declared hot. Best-effort: a no-op on the
    /// disabled variant.
    pub fn mark_hot(&self, key: &str) {
        if let Variant::Enabled(pool) = &self.variant {
            lock(pool).put(CacheKey::Hot(key.to_string()), CacheEntry::Marker);
        }
    }

    /// Whether a key currently carries the hot flag. Touches recency.
    pub fn is_hot(&self, key: &str) -> bool {
        match &self.variant {
            Variant::Enabled(pool) => lock(pool).get(&CacheKey::Hot(key.to_string())).is_some(),
            Variant::Disabled => false,
        }
    }

    /// Cache a retrieved value under the value namespace
    pub fn put_value(&self, key: &str, value: serde_json::Value) {
        if let Variant::Enabled(pool) = &self.variant {
            lock(pool).put(CacheKey::Value(key.to_string()), CacheEntry::Value(value));
        }
    }

    /// Look up a cached value. Touches recency on a hit.
    pub fn value(&self, key: &str) -> Option<serde_json::Value> {
        match &self.variant {
            Variant::Enabled(pool) => match lock(pool).get(&CacheKey::Value(key.to_string())) {
                Some(CacheEntry::Value(v)) => Some(v.clone()),
                // A hot marker under the same key string lives in a different
                // namespace and must not satisfy value reads.
                _ => None,
            },
            Variant::Disabled => None,
        }
    }

    /// Number of live entries across both namespaces
    pub fn len(&self) -> usize {
        match &self.variant {
            Variant::Enabled(pool) => lock(pool).len(),
            Variant::Disabled => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lock the pool, recovering the guard if a panicking thread poisoned it
fn lock(pool: &Pool) -> MutexGuard<'_, LruCache<CacheKey, CacheEntry>> {
    pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_and_get_value() {
        let cache = LocalCache::new(true, 4);
        cache.put_value("k1", json!({"a": 1}));
        assert_eq!(cache.value("k1"), Some(json!({"a": 1})));
        assert_eq!(cache.value("k2"), None);
    }

    #[test]
    fn test_disabled_cache_never_stores() {
        let cache = LocalCache::new(false, 1024);
        cache.put_value("k1", json!(1));
        cache.mark_hot("k1");
        assert!(!cache.is_enabled());
        assert_eq!(cache.value("k1"), None);
        assert!(!cache.is_hot("k1"));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_zero_capacity_is_disabled() {
        let cache = LocalCache::new(true, 0);
        assert!(!cache.is_enabled());
    }

    #[test]
    fn test_namespaces_are_disjoint() {
        let cache = LocalCache::new(true, 8);
        cache.mark_hot("k1");
        assert!(cache.is_hot("k1"));
        assert_eq!(cache.value("k1"), None, "hot flag must not satisfy a value read");

        cache.put_value("k1", json!("v"));
        assert!(cache.is_hot("k1"));
        assert_eq!(cache.value("k1"), Some(json!("v")));
        assert_eq!(cache.len(), 2, "marker and value occupy separate slots");
    }

    #[test]
    fn test_inserting_capacity_plus_one_evicts_lru() {
        let cache = LocalCache::new(true, 3);
        cache.put_value("a", json!(1));
        cache.put_value("b", json!(2));
        cache.put_value("c", json!(3));

        // Touch "a" so "b" becomes the least recently used
        assert!(cache.value("a").is_some());

        cache.put_value("d", json!(4));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.value("b"), None, "least-recently-used entry evicted");
        assert!(cache.value("a").is_some());
        assert!(cache.value("c").is_some());
        assert!(cache.value("d").is_some());
    }

    #[test]
    fn test_namespaces_share_one_eviction_pool() {
        let cache = LocalCache::new(true, 2);
        cache.mark_hot("a");
        cache.put_value("b", json!(2));
        cache.put_value("c", json!(3));

        // Capacity 2: the oldest entry (the hot marker) is gone
        assert!(!cache.is_hot("a"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_default_capacity() {
        let cache = LocalCache::with_default_capacity();
        assert!(cache.is_enabled());
        assert!(cache.is_empty());
    }
}
