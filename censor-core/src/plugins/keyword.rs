//! Keyword plugin (§4.4): blocks text containing a blacklisted substring
//! after normalization.
//!
//! Normalization strips every character that is not a Cyrillic or Latin
//! letter, then lowercases what remains. This is an intentional departure
//! from a literal `[^\p{Cyrillic}\p{Latin}][:graph:]`-style regex (which is
//! ambiguous about what it strips); stripping to just the letter set is the
//! unambiguous reading and is what the test suite locks in.
//!
//! Normalization applies only to the message text, not to blacklist entries:
//! a blacklisted entry is lowercased and nothing else, matching the original
//! bot's own `strings.ToLower` treatment of its blacklist.

use async_trait::async_trait;
use serde_json::json;

use crate::error::Result;
use crate::message::{Decision, Message};
use crate::plugin::{EvalContext, Plugin, PluginConfigEntry};

pub const PRIORITY: i32 = 10;

pub struct KeywordPlugin {
    blacklist: Vec<String>,
}

impl KeywordPlugin {
    pub fn new(config: &PluginConfigEntry) -> Result<Self> {
        let blacklist = config
            .get_str_list("blacklist")
            .into_iter()
            .map(|w| w.to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Ok(Self { blacklist })
    }
}

fn is_cyrillic_or_latin(c: char) -> bool {
    c.is_ascii_alphabetic() || ('\u{0400}'..='\u{04FF}').contains(&c)
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| is_cyrillic_or_latin(*c))
        .collect::<String>()
        .to_lowercase()
}

#[async_trait]
impl Plugin for KeywordPlugin {
    fn name(&self) -> &str {
        "keyword"
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    async fn evaluate(&self, _ctx: &EvalContext, msg: &Message) -> Result<Decision> {
        let payload = msg.text_or_caption();
        if payload.is_empty() {
            return Ok(Decision::skip(self.name()));
        }
        let normalized = normalize(payload);
        for keyword in &self.blacklist {
            if normalized.contains(keyword.as_str()) {
                return Ok(Decision::block(self.name(), "blacklisted keyword")
                    .with_metadata("keyword", json!(keyword)));
            }
        }
        Ok(Decision::skip(self.name()))
    }
}
