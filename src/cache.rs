//! Bounded caches shared by every expression bound against the same
//! [`Caches`] instance.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;

use crate::config::EngineConfig;
use crate::functions::date::{DatePattern, Zone};

/// A thread-safe LRU map.
pub struct BoundedCache<K: Hash + Eq, V> {
    inner: Mutex<LruCache<K, V>>,
}

impl<K: Hash + Eq + Clone, V: Clone> BoundedCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        BoundedCache {
            inner: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().get(key).cloned()
    }

    /// Look up `key`, computing and storing it on a miss. Failed computations
    /// are not cached.
    pub fn get_or_try_insert<E>(&self, key: &K, create: impl FnOnce() -> Result<V, E>) -> Result<V, E> {
        if let Some(v) = self.get(key) {
            return Ok(v);
        }
        // Computed outside the lock; a racing insert of the same key is harmless.
        let value = create()?;
        self.inner.lock().put(key.clone(), value.clone());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The caches used while binding and evaluating expressions.
pub struct Caches {
    pub regex: BoundedCache<String, Regex>,
    pub date_patterns: BoundedCache<String, Arc<DatePattern>>,
    pub time_zones: BoundedCache<String, Zone>,
}

impl Caches {
    pub fn new(config: &EngineConfig) -> Self {
        Caches {
            regex: BoundedCache::new(config.regex_cache_capacity),
            date_patterns: BoundedCache::new(config.date_pattern_cache_capacity),
            time_zones: BoundedCache::new(config.time_zone_cache_capacity),
        }
    }

    /// Compile `pattern`, anchoring it to the whole input when `full_match`
    /// is set.
    pub fn regex(&self, pattern: &str, full_match: bool) -> Result<Regex, regex::Error> {
        let source = if full_match {
            format!("^(?:{pattern})$")
        } else {
            pattern.to_string()
        };
        self.regex.get_or_try_insert(&source, || Regex::new(&source))
    }

    pub fn date_pattern(&self, pattern: &str) -> Result<Arc<DatePattern>, String> {
        self.date_patterns
            .get_or_try_insert(&pattern.to_string(), || DatePattern::compile(pattern).map(Arc::new))
    }

    pub fn time_zone(&self, zone: &str) -> Result<Zone, String> {
        self.time_zones
            .get_or_try_insert(&zone.to_string(), || Zone::parse(zone))
    }
}

impl Default for Caches {
    fn default() -> Self {
        Caches::new(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_least_recently_used() {
        let cache: BoundedCache<String, usize> = BoundedCache::new(2);
        for (i, k) in ["a", "b", "c"].iter().enumerate() {
            let _ = cache.get_or_try_insert::<()>(&k.to_string(), || Ok(i));
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.get(&"c".to_string()), Some(2));
    }

    #[test]
    fn test_failed_compile_not_cached() {
        let caches = Caches::default();
        assert!(caches.regex("(", false).is_err());
        assert!(caches.regex.is_empty());
        assert!(caches.regex("a+", true).unwrap().is_match("aaa"));
        assert!(!caches.regex("a+", true).unwrap().is_match("aaab"));
    }
}
