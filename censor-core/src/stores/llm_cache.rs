//! Content-addressed, TTL+LRU response cache for the LLM plugin (§4.9).
//!
//! Capacity 0 is explicitly required not to crash: it is treated as capacity
//! 1 internally, so `set` still inserts and every subsequent `set` evicts to
//! make room again.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

struct CacheEntry<T> {
    response: T,
    cached_at: Instant,
}

pub struct LlmCache<T: Clone> {
    ttl: Duration,
    entries: Mutex<LruCache<String, CacheEntry<T>>>,
}

impl<T: Clone> LlmCache<T> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the cached response, or `None` on miss. An expired entry is
    /// deleted on the way out. A hit promotes the entry to most-recently-used.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        let expired = entries
            .peek(key)
            .map(|e| now.duration_since(e.cached_at) > self.ttl)
            .unwrap_or(false);
        if expired {
            entries.pop(key);
            return None;
        }
        entries.get(key).map(|entry| entry.response.clone())
    }

    pub fn set(&self, key: String, response: T) {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        entries.put(key, CacheEntry { response, cached_at: now });
    }

    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        let expired_keys: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.cached_at) > self.ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired_keys {
            entries.pop(&key);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_then_miss_after_ttl() {
        let cache = LlmCache::new(10, Duration::from_millis(5));
        cache.set("k".into(), "v".to_string());
        assert_eq!(cache.get("k"), Some("v".to_string()));
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn zero_capacity_does_not_panic() {
        let cache: LlmCache<String> = LlmCache::new(0, Duration::from_secs(60));
        cache.set("a".into(), "1".into());
        cache.set("b".into(), "2".into());
        cache.set("c".into(), "3".into());
        assert!(cache.len() <= 1);
    }

    #[test]
    fn lru_eviction_keeps_most_recently_accessed() {
        let cache = LlmCache::new(2, Duration::from_secs(60));
        cache.set("a".into(), "1".to_string());
        cache.set("b".into(), "2".to_string());
        // touch "a" so it is more recently used than "b"
        assert_eq!(cache.get("a"), Some("1".to_string()));
        cache.set("c".into(), "3".to_string());
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some("1".to_string()));
        assert_eq!(cache.get("c"), Some("3".to_string()));
    }
}
