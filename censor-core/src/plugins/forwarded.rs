//! Forwarded-source plugin (§4.6): allows or blocks messages forwarded from
//! elsewhere based on an allowlist of user and chat ids.

use async_trait::async_trait;

use crate::error::Result;
use crate::message::{Decision, Message};
use crate::plugin::{EvalContext, Plugin, PluginConfigEntry};

pub const PRIORITY: i32 = 15;

pub struct ForwardedPlugin {
    allowed_user_ids: Vec<i64>,
    allowed_chat_ids: Vec<i64>,
}

impl ForwardedPlugin {
    pub fn new(config: &PluginConfigEntry) -> Result<Self> {
        Ok(Self {
            allowed_user_ids: config.get_i64_list("allowed_user_ids"),
            allowed_chat_ids: config.get_i64_list("allowed_chat_ids"),
        })
    }
}

#[async_trait]
impl Plugin for ForwardedPlugin {
    fn name(&self) -> &str {
        "forwarded"
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    async fn evaluate(&self, _ctx: &EvalContext, msg: &Message) -> Result<Decision> {
        let (from_user, from_chat) = (msg.forwarded_from_user_id, msg.forwarded_from_chat_id);

        if from_user.is_none() && from_chat.is_none() {
            return Ok(Decision::skip(self.name()));
        }

        if let Some(user_id) = from_user {
            if self.allowed_user_ids.contains(&user_id) {
                return Ok(Decision::allow(self.name(), "forwarded from allowed user"));
            }
        }

        if let Some(chat_id) = from_chat {
            if self.allowed_chat_ids.contains(&chat_id) {
                return Ok(Decision::allow(self.name(), "forwarded from allowed chat"));
            }
        }

        Ok(Decision::block(self.name(), "forwarded from unapproved source"))
    }
}
