//! Pass-scoped resolution cache.
//!
//! Resolved values are memoized for the remainder of one resolution pass so a
//! reference used at several locations is resolved once. The cache is owned by
//! a single [`ReferenceResolver`](super::ReferenceResolver) and is never shared
//! between passes.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Cache keyed by `"<resourceId>.<fieldPath>"` or `"cel:<expression>"`.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    /// Map from cache key to resolved value
    entries: HashMap<String, Value>,
    /// Cache statistics
    hits: usize,
    misses: usize,
}

/// Snapshot of resolver cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: usize,
    /// Lookups that had to resolve
    pub misses: usize,
    /// Cached entries
    pub entries: usize,
    /// Calls made to the live-fetch collaborator
    pub live_fetches: usize,
}

impl CacheStats {
    /// Hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached value if available, counting the lookup.
    pub fn get(&mut self, key: &str) -> Option<&Value> {
        if let Some(value) = self.entries.get(key) {
            self.hits += 1;
            Some(value)
        } else {
            self.misses += 1;
            None
        }
    }

    pub fn insert(&mut self, key: String, value: Value) {
        self.entries.insert(key, value);
    }

    /// Drop every entry and reset statistics.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)`
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hits_and_misses() {
        let mut cache = ResolutionCache::new();
        assert!(cache.get("svc.status.clusterIP").is_none());
        cache.insert("svc.status.clusterIP".to_string(), json!("10.0.0.1"));
        assert_eq!(cache.get("svc.status.clusterIP"), Some(&json!("10.0.0.1")));
        assert_eq!(cache.stats(), (1, 1));

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), (0, 0));
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            entries: 1,
            live_fetches: 0,
        };
        assert!((stats.hit_rate() - 75.0).abs() < f64::EPSILON);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
