//! Per-(chat, content-hash) repeat counter with a rolling window (§4.7).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    count: u32,
    first_seen: Instant,
    last_seen: Instant,
}

pub struct DuplicateStore {
    entries: Mutex<HashMap<(i64, String), Entry>>,
}

impl DuplicateStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Records one occurrence of `hash` in `chat_id`; resets the counter if
    /// the existing entry is older than `window`. Returns the post-record
    /// count.
    pub fn record(&self, chat_id: i64, hash: &str, window: Duration) -> u32 {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        let key = (chat_id, hash.to_string());
        match entries.get_mut(&key) {
            Some(entry) if now.duration_since(entry.first_seen) <= window => {
                entry.count += 1;
                entry.last_seen = now;
                entry.count
            }
            _ => {
                entries.insert(
                    key,
                    Entry {
                        count: 1,
                        first_seen: now,
                        last_seen: now,
                    },
                );
                1
            }
        }
    }

    pub fn cleanup(&self, window: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, entry| now.duration_since(entry.first_seen) <= window);
    }
}

impl Default for DuplicateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeats_within_window_accumulate() {
        let store = DuplicateStore::new();
        let window = Duration::from_secs(300);
        assert_eq!(store.record(1, "abc", window), 1);
        assert_eq!(store.record(1, "abc", window), 2);
        assert_eq!(store.record(1, "abc", window), 3);
    }

    #[test]
    fn separate_chats_dont_share_counts() {
        let store = DuplicateStore::new();
        let window = Duration::from_secs(300);
        assert_eq!(store.record(1, "abc", window), 1);
        assert_eq!(store.record(2, "abc", window), 1);
    }

    #[test]
    fn expired_window_resets_to_one() {
        let store = DuplicateStore::new();
        let tiny = Duration::from_millis(1);
        assert_eq!(store.record(1, "abc", tiny), 1);
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(store.record(1, "abc", tiny), 1);
    }
}
