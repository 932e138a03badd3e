//! Rate-limit plugin (§4.3): blocks a user once their message rate within a
//! sliding window exceeds a configured quota.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::{Error, Result};
use crate::message::{Decision, Message};
use crate::plugin::{EvalContext, Plugin, PluginConfigEntry};
use crate::stores::rate_limit::RateLimitStore;

pub const PRIORITY: i32 = 5;
const DEFAULT_MAX_MESSAGES: i64 = 5;
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

pub struct RateLimitPlugin {
    max_messages: u32,
    window: Duration,
    store: RateLimitStore,
}

impl RateLimitPlugin {
    pub fn new(config: &PluginConfigEntry) -> Result<Self> {
        let max_messages = config.get_i64("max_messages").unwrap_or(DEFAULT_MAX_MESSAGES);
        if max_messages <= 0 {
            return Err(Error::InvalidConfig("max_messages must be > 0".into()));
        }
        let window = match config.get_str("window") {
            Some(s) => crate::duration::parse_duration(s)?,
            None => DEFAULT_WINDOW,
        };
        if window.is_zero() {
            return Err(Error::InvalidConfig("window must be > 0".into()));
        }
        Ok(Self {
            max_messages: max_messages as u32,
            window,
            store: RateLimitStore::new(),
        })
    }
}

#[async_trait]
impl Plugin for RateLimitPlugin {
    fn name(&self) -> &str {
        "ratelimit"
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    async fn evaluate(&self, _ctx: &EvalContext, msg: &Message) -> Result<Decision> {
        let count = self.store.increment_and_get(msg.user_id, self.window);
        if count > self.max_messages {
            Ok(Decision::block(self.name(), "rate limit exceeded")
                .with_metadata("count", json!(count))
                .with_metadata("limit", json!(self.max_messages)))
        } else {
            Ok(Decision::skip(self.name()))
        }
    }

    async fn cleanup(&self) {
        self.store.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(user_id: i64) -> Message {
        Message {
            user_id,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn blocks_after_limit_exceeded() {
        let mut config = PluginConfigEntry::default();
        config.opts.insert("max_messages".into(), json!(2));
        config.opts.insert("window".into(), json!("1m"));
        let plugin = RateLimitPlugin::new(&config).unwrap();
        let ctx = EvalContext::with_timeout(Duration::from_secs(1));

        assert_eq!(plugin.evaluate(&ctx, &msg(7)).await.unwrap().action, crate::message::Action::Skip);
        assert_eq!(plugin.evaluate(&ctx, &msg(7)).await.unwrap().action, crate::message::Action::Skip);
        let third = plugin.evaluate(&ctx, &msg(7)).await.unwrap();
        assert_eq!(third.action, crate::message::Action::Block);
        assert_eq!(third.metadata["count"], json!(3));
        assert_eq!(third.metadata["limit"], json!(2));
    }

    #[test]
    fn rejects_non_positive_max_messages() {
        let mut config = PluginConfigEntry::default();
        config.opts.insert("max_messages".into(), json!(0));
        assert!(RateLimitPlugin::new(&config).is_err());
    }
}
