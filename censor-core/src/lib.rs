//! # Censor Core
//!
//! The plugin-based moderation engine used by the censor bot: a message
//! evaluation contract, six built-in plugins, the stores they keep state
//! in, and the manager that orchestrates them.
//!
//! ## Overview
//!
//! `censor-core` provides:
//! - **A plugin contract** (`Plugin`) that every moderation check
//!   implements: `name`, `priority`, `evaluate`, `cleanup`.
//! - **Six built-in plugins**: rate limiting, keyword blacklist, regex
//!   patterns, forwarded-source checks, duplicate detection, and an
//!   LLM-backed classifier with its own response cache.
//! - **A manager** that registers plugins, orders them by priority, and
//!   evaluates a message either sequentially or in parallel, honoring a
//!   per-evaluation deadline.
//! - **Stores** each stateful plugin owns: an in-memory rate-limit
//!   counter, a duplicate-content counter, an LLM response cache, and a
//!   TTL-windowed violation counter used by the bot's escalation policy.
//!
//! ## Quick Start
//!
//! ```rust
//! use censor_core::{
//!     create_plugin, Action, ManagerConfig, Message, PluginConfigEntry, PluginManager, Strategy,
//! };
//! use std::time::Duration;
//!
//! # async fn run() -> censor_core::Result<()> {
//! let manager = PluginManager::new(ManagerConfig {
//!     strategy: Strategy::Sequential,
//!     timeout: Duration::from_secs(2),
//!     enabled_only: true,
//!     error_action: Action::Block,
//!     skip_action: Action::Allow,
//! })?;
//!
//! let mut config = PluginConfigEntry {
//!     enabled: true,
//!     ..Default::default()
//! };
//! config
//!     .opts
//!     .insert("blacklist".into(), serde_json::json!(["spam"]));
//! manager
//!     .register(create_plugin("keyword", &config)?, config)
//!     .await?;
//!
//! let decision = manager
//!     .evaluate(&Message {
//!         text: "buy cheap spam now".to_string(),
//!         ..Default::default()
//!     })
//!     .await;
//! assert_eq!(decision.action, Action::Block);
//! # Ok(())
//! # }
//! ```
//!
//! ## Plugin Strategies
//!
//! - **Sequential**: plugins run in priority order; the first `allow`
//!   short-circuits and wins, a `block` is remembered but does not stop
//!   the loop (a later `allow` can still override it).
//! - **Parallel**: all selected plugins run concurrently; the first
//!   collected `allow` wins, otherwise any collected `block` wins,
//!   otherwise the result is `skip`.
//!
//! ## Error Handling
//!
//! Plugin construction and evaluation return `censor_core::Error`. The
//! manager never propagates a plugin's error to the caller directly —
//! it substitutes the configured `error_action` so a flaky classifier
//! can't take an entire chat's moderation down with it.
//!
//! ```rust
//! use censor_core::Error;
//!
//! fn describe(err: &Error) -> &'static str {
//!     match err {
//!         Error::Timeout => "evaluation exceeded its deadline",
//!         Error::PluginError { .. } => "a plugin failed",
//!         _ => "other",
//!     }
//! }
//! ```

pub mod duration;
pub mod error;
pub mod http;
pub mod manager;
pub mod message;
pub mod metrics;
pub mod plugin;
pub mod plugins;
pub mod stores;

pub use duration::parse_duration;
pub use error::{Error, Result};
pub use manager::{ManagerConfig, PluginManager, Strategy};
pub use message::{Action, Decision, Message};
pub use metrics::{MetricsSink, NoopMetricsSink};
pub use plugin::{EvalContext, Plugin, PluginConfigEntry};
pub use plugins::{create_plugin, default_priority, BuiltinPlugin};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_priority_covers_every_builtin() {
        for name in ["ratelimit", "keyword", "regex", "forwarded", "duplicate", "llm"] {
            assert!(default_priority(name).is_some(), "missing priority for {name}");
        }
        assert_eq!(default_priority("nonexistent"), None);
    }

    #[test]
    fn create_plugin_rejects_unknown_name() {
        let config = PluginConfigEntry::default();
        assert!(matches!(create_plugin("nonexistent", &config), Err(Error::InvalidConfig(_))));
    }
}
