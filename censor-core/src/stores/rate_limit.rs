//! Per-user sliding-window message counter (§4.3, data model §3).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    count: u32,
    reset_at: Instant,
}

pub struct RateLimitStore {
    entries: Mutex<HashMap<i64, Entry>>,
}

impl RateLimitStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Increments the user's counter, resetting the window if it has
    /// elapsed, and returns the post-increment count.
    pub fn increment_and_get(&self, user_id: i64, window: Duration) -> u32 {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(user_id).or_insert_with(|| Entry {
            count: 0,
            reset_at: now,
        });
        if entry.count == 0 || now >= entry.reset_at {
            entry.count = 1;
            entry.reset_at = now + window;
        } else {
            entry.count += 1;
        }
        entry.count
    }

    /// Drops windows that have fully elapsed.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, entry| now < entry.reset_at);
    }
}

impl Default for RateLimitStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_within_window() {
        let store = RateLimitStore::new();
        let window = Duration::from_secs(60);
        assert_eq!(store.increment_and_get(7, window), 1);
        assert_eq!(store.increment_and_get(7, window), 2);
        assert_eq!(store.increment_and_get(7, window), 3);
    }

    #[test]
    fn separate_users_separate_counters() {
        let store = RateLimitStore::new();
        let window = Duration::from_secs(60);
        assert_eq!(store.increment_and_get(1, window), 1);
        assert_eq!(store.increment_and_get(2, window), 1);
        assert_eq!(store.increment_and_get(1, window), 2);
    }

    #[test]
    fn cleanup_drops_expired_only() {
        let store = RateLimitStore::new();
        store.increment_and_get(1, Duration::from_millis(1));
        store.increment_and_get(2, Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(5));
        store.cleanup();
        let entries = store.entries.lock().unwrap();
        assert!(!entries.contains_key(&1));
        assert!(entries.contains_key(&2));
    }
}
