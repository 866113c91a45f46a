/// Session-scoped memoization for external model calls.
///
/// Entries live for as long as the owning session and are never evicted on their own.
/// Callers wrap the cache in a lock and hold it across the external call, so identical
/// requests issued back to back hit the network exactly once.
///
/// Key schema (namespaced by call kind):
/// - `embed:v1:{sha256(task | credential | len:text ...)}` for embedding batches
/// - `generate:v1:{sha256(credential | len:prompt)}` for generated text
use std::collections::HashMap;

use sha2::{Digest, Sha256};

pub struct SessionCache<V> {
    entries: HashMap<String, V>,
    hits: u64,
    misses: u64,
}

impl<V: Clone> SessionCache<V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a cached value, counting the hit or miss.
    pub fn get(&mut self, key: &str) -> Option<V> {
        match self.entries.get(key) {
            Some(value) => {
                self.hits += 1;
                Some(value.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: String, value: V) {
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<V: Clone> Default for SessionCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Compute a deterministic cache key from an ordered list of parts.
///
/// Every part is length-prefixed so that `["a b"]` and `["a", "b"]` never collide.
pub fn cache_key(namespace: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    let hash = hasher.finalize();
    format!("{namespace}:v1:{:x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_deterministic() {
        let a = cache_key("embed", &["doc", "key", "hello"]);
        let b = cache_key("embed", &["doc", "key", "hello"]);
        assert_eq!(a, b);
        assert!(a.starts_with("embed:v1:"));
    }

    #[test]
    fn test_cache_key_separates_part_boundaries() {
        let joined = cache_key("embed", &["a b"]);
        let split = cache_key("embed", &["a", "b"]);
        assert_ne!(joined, split);
    }

    #[test]
    fn test_cache_key_separates_namespaces() {
        assert_ne!(
            cache_key("embed", &["same"]),
            cache_key("generate", &["same"])
        );
    }

    #[test]
    fn test_get_counts_hits_and_misses() {
        let mut cache: SessionCache<u32> = SessionCache::new();
        assert_eq!(cache.get("k"), None);
        cache.insert("k".to_string(), 7);
        assert_eq!(cache.get("k"), Some(7));
        assert_eq!(cache.get("k"), Some(7));

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_clear_keeps_counters() {
        let mut cache: SessionCache<&str> = SessionCache::new();
        cache.insert("k".to_string(), "v");
        let _ = cache.get("k");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 1);
    }
}
