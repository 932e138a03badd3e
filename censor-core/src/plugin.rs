//! The plugin contract (§4.1): the capability set every built-in plugin
//! implements, plus the per-evaluation deadline plugins must honor.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::Result;
use crate::message::{Decision, Message};

/// Carries the deadline for one `evaluate` call. Plugins that make their
/// own remote calls (the LLM plugin) narrow this further with their own
/// per-call timeout; they never ignore it.
#[derive(Clone, Copy, Debug)]
pub struct EvalContext {
    deadline: Instant,
}

impl EvalContext {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// Per-plugin, per-registration configuration: whether it runs, its
/// effective-priority override, and its plugin-specific options (§3).
#[derive(Clone, Debug, Default)]
pub struct PluginConfigEntry {
    pub enabled: bool,
    pub priority_override: Option<i32>,
    pub opts: HashMap<String, serde_json::Value>,
}

impl PluginConfigEntry {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.opts.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.opts.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.opts.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_str_list(&self, key: &str) -> Vec<String> {
        self.opts
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_i64_list(&self, key: &str) -> Vec<i64> {
        self.opts
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(|v| v.as_i64()).collect())
            .unwrap_or_default()
    }
}

/// Every moderation plugin exposes this contract (§4.1). Implementors must
/// never panic out of `evaluate`; all failures return as `Error`.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique, stable identifier.
    fn name(&self) -> &str;

    /// Default ordering key; lower runs earlier.
    fn priority(&self) -> i32;

    /// Pure w.r.t. inputs plus the plugin's own store; may block on I/O up
    /// to `ctx`'s deadline.
    async fn evaluate(&self, ctx: &EvalContext, msg: &Message) -> Result<Decision>;

    /// Idempotent, bounded-time store maintenance. No-op for stateless
    /// plugins.
    async fn cleanup(&self) {}
}
