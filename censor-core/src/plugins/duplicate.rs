//! Duplicate-content plugin (§4.7): blocks a message once the same
//! normalized text has been repeated too many times in a chat within a
//! rolling window.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::{Error, Result};
use crate::message::{Decision, Message};
use crate::plugin::{EvalContext, Plugin, PluginConfigEntry};
use crate::stores::duplicate::DuplicateStore;

pub const PRIORITY: i32 = 150;
const DEFAULT_MAX_DUPLICATES: i64 = 1;
const DEFAULT_WINDOW: Duration = Duration::from_secs(300);
const MIN_WINDOW: Duration = Duration::from_secs(10);
const MAX_WINDOW: Duration = Duration::from_secs(24 * 3600);
const MIN_NORMALIZED_LEN: usize = 3;

pub struct DuplicatePlugin {
    max_occurrences: u32,
    window: Duration,
    store: DuplicateStore,
}

impl DuplicatePlugin {
    pub fn new(config: &PluginConfigEntry) -> Result<Self> {
        let max_duplicates = config.get_i64("max_duplicates").unwrap_or(DEFAULT_MAX_DUPLICATES);
        if max_duplicates < 0 {
            return Err(Error::InvalidConfig("max_duplicates must be >= 0".into()));
        }
        let window = match config.get_str("window") {
            Some(s) => crate::duration::parse_duration(s)?,
            None => DEFAULT_WINDOW,
        };
        if window < MIN_WINDOW || window > MAX_WINDOW {
            return Err(Error::InvalidConfig(format!(
                "window must be between {MIN_WINDOW:?} and {MAX_WINDOW:?}"
            )));
        }
        Ok(Self {
            max_occurrences: max_duplicates as u32 + 1,
            window,
            store: DuplicateStore::new(),
        })
    }
}

/// `trim(text)` if non-empty, else `trim(caption)`; lowercased with
/// whitespace runs collapsed to a single space.
fn normalize_text(msg: &Message) -> String {
    let raw = if !msg.text.trim().is_empty() {
        msg.text.trim()
    } else {
        msg.caption.trim()
    };
    let lowered = raw.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut last_was_space = false;
    for c in lowered.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out
}

const FNV32_OFFSET_BASIS: u32 = 0x811c9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a of the UTF-8 bytes, hex-encoded. Matches `hash/fnv.New32a`.
fn fnv1a_hex(s: &str) -> String {
    let mut hash = FNV32_OFFSET_BASIS;
    for byte in s.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV32_PRIME);
    }
    format!("{hash:08x}")
}

#[async_trait]
impl Plugin for DuplicatePlugin {
    fn name(&self) -> &str {
        "duplicate"
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    async fn evaluate(&self, _ctx: &EvalContext, msg: &Message) -> Result<Decision> {
        let normalized = normalize_text(msg);
        if normalized.len() < MIN_NORMALIZED_LEN {
            return Ok(Decision::skip(self.name()));
        }
        let hash = fnv1a_hex(&normalized);
        let count = self.store.record(msg.chat_id, &hash, self.window);
        if count > self.max_occurrences {
            Ok(Decision::block(self.name(), "duplicate message")
                .with_metadata("count", json!(count))
                .with_metadata("max_occurrences", json!(self.max_occurrences))
                .with_metadata("window", json!(self.window.as_secs()))
                .with_metadata("message_hash", json!(hash)))
        } else {
            Ok(Decision::skip(self.name()))
        }
    }

    async fn cleanup(&self) {
        self.store.cleanup(self.window);
    }
}
