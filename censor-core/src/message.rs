//! The data model shared by every plugin: the inbound message view and the
//! decision type plugins and the manager exchange.

use std::collections::HashMap;

/// A chat message as seen by the engine, already extracted from whichever
/// update field (message, edited message, channel post, ...) carried it.
/// Immutable for the duration of one evaluation.
#[derive(Clone, Debug, Default)]
pub struct Message {
    pub text: String,
    pub caption: String,
    pub user_id: i64,
    pub chat_id: i64,
    pub message_id: i64,
    pub is_edit: bool,
    pub forwarded_from_user_id: Option<i64>,
    pub forwarded_from_chat_id: Option<i64>,
}

impl Message {
    /// Text if present, else caption. Neither trimmed nor normalized.
    pub fn text_or_caption(&self) -> &str {
        if !self.text.is_empty() {
            &self.text
        } else {
            &self.caption
        }
    }
}

/// The three-way outcome every plugin and the manager itself produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Allow,
    Block,
    Skip,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Block => "block",
            Action::Skip => "skip",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A plugin's (or the manager's) verdict. `skip` means "no opinion,
/// continue"; `allow`/`block` are opinions whose precedence the strategy
/// decides.
#[derive(Clone, Debug)]
pub struct Decision {
    pub action: Action,
    pub reason: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub plugin: String,
}

impl Decision {
    pub fn skip(plugin: impl Into<String>) -> Self {
        Self {
            action: Action::Skip,
            reason: String::new(),
            metadata: HashMap::new(),
            plugin: plugin.into(),
        }
    }

    pub fn allow(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action: Action::Allow,
            reason: reason.into(),
            metadata: HashMap::new(),
            plugin: plugin.into(),
        }
    }

    pub fn block(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action: Action::Block,
            reason: reason.into(),
            metadata: HashMap::new(),
            plugin: plugin.into(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
