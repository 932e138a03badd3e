//! Regex plugin (§4.5): blocks text matching any of a configured list of
//! regular expressions, compiled once at construction time.

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;

use crate::error::{Error, Result};
use crate::message::{Decision, Message};
use crate::plugin::{EvalContext, Plugin, PluginConfigEntry};

pub const PRIORITY: i32 = 20;

pub struct RegexPlugin {
    patterns: Vec<Regex>,
}

impl RegexPlugin {
    pub fn new(config: &PluginConfigEntry) -> Result<Self> {
        let raw = config.get_str_list("patterns");
        let mut patterns = Vec::with_capacity(raw.len());
        for pattern in raw {
            let compiled = Regex::new(&pattern)
                .map_err(|e| Error::InvalidConfig(format!("bad regex pattern {pattern:?}: {e}")))?;
            patterns.push(compiled);
        }
        Ok(Self { patterns })
    }
}

#[async_trait]
impl Plugin for RegexPlugin {
    fn name(&self) -> &str {
        "regex"
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    async fn evaluate(&self, _ctx: &EvalContext, msg: &Message) -> Result<Decision> {
        let payload = msg.text_or_caption();
        for pattern in &self.patterns {
            if pattern.is_match(payload) {
                return Ok(Decision::block(self.name(), "matched blocked pattern")
                    .with_metadata("pattern", json!(pattern.as_str())));
            }
        }
        Ok(Decision::skip(self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Action;
    use std::time::Duration;

    fn plugin(patterns: &[&str]) -> RegexPlugin {
        let mut config = PluginConfigEntry::default();
        config.opts.insert(
            "patterns".into(),
            json!(patterns.iter().map(|s| s.to_string()).collect::<Vec<_>>()),
        );
        RegexPlugin::new(&config).unwrap()
    }

    #[tokio::test]
    async fn blocks_on_text_match() {
        let plugin = plugin(&[r"\bfree.*crypto\b"]);
        let ctx = EvalContext::with_timeout(Duration::from_secs(1));
        let msg = Message {
            text: "claim your free airdrop crypto now".into(),
            ..Default::default()
        };
        let decision = plugin.evaluate(&ctx, &msg).await.unwrap();
        assert_eq!(decision.action, Action::Block);
    }

    #[tokio::test]
    async fn falls_back_to_caption_when_text_empty() {
        let plugin = plugin(&["urgent"]);
        let ctx = EvalContext::with_timeout(Duration::from_secs(1));
        let msg = Message {
            caption: "urgent offer".into(),
            ..Default::default()
        };
        let decision = plugin.evaluate(&ctx, &msg).await.unwrap();
        assert_eq!(decision.action, Action::Block);
    }

    #[test]
    fn invalid_pattern_rejects_config() {
        let mut config = PluginConfigEntry::default();
        config.opts.insert("patterns".into(), json!(["("]));
        assert!(RegexPlugin::new(&config).is_err());
    }
}
