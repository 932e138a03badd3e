//! Per-user violation counter driving ban escalation (§4.10).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::duration::parse_duration;
use crate::error::Error;

struct Entry {
    count: u32,
    since: Instant,
}

pub struct ViolationStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ViolationStore {
    /// Constructs a store from a `memory://<name>?ttl=<duration>` storage
    /// URL. Any scheme other than `memory` is rejected with `init-failed`;
    /// the TTL must parse and be non-zero.
    pub fn from_url(url: &str) -> Result<Self, Error> {
        let rest = url
            .strip_prefix("memory://")
            .ok_or_else(|| Error::InitFailed(format!("unsupported storage scheme: {url}")))?;

        let query = rest
            .split_once('?')
            .map(|(_, q)| q)
            .ok_or_else(|| Error::InitFailed(format!("missing ttl parameter: {url}")))?;

        let ttl_str = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("ttl="))
            .ok_or_else(|| Error::InitFailed(format!("missing ttl parameter: {url}")))?;

        let ttl = parse_duration(ttl_str).map_err(|e| Error::InvalidTtl(e.to_string()))?;
        if ttl.is_zero() {
            return Err(Error::InvalidTtl("ttl must be positive".into()));
        }

        Ok(Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        })
    }

    #[cfg(test)]
    fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Increments the counter for `key`, resetting it if its window has
    /// expired. First creation yields `count = 1`.
    pub fn get_or_set(&self, key: &str) -> u32 {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(key) {
            Some(entry) if now.duration_since(entry.since) <= self.ttl => {
                entry.count += 1;
                entry.count
            }
            _ => {
                entries.insert(key.to_string(), Entry { count: 1, since: now });
                1
            }
        }
    }
}
