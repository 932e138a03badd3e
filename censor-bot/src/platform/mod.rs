//! # Chat Platform Boundary
//!
//! The engine only ever sees `censor_core::Message`. Getting there — and
//! acting on a block decision — goes through this module's `ChatClient`
//! trait, grounded on the RPC shapes of the Telegram Bot API and the
//! `userToString`/update-loop pattern in a simpler reference bot written in
//! another language.
//!
//! `next_update` is a plain polling method rather than a `Stream`: the
//! bootstrap only ever wants "the next update, or none yet", so there's no
//! need for `tokio-stream` machinery here.

pub mod telegram;

use async_trait::async_trait;
use censor_core::Message;

pub use telegram::TelegramClient;

/// The sender of an update, as seen by the platform. Carries the fields the
/// action pipeline's actor-identity formatting needs that `Message` itself
/// has no use for.
#[derive(Clone, Debug, Default)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

/// One incoming update, already narrowed to whichever field
/// (`message`/`edited_message`/`channel_post`/`edited_channel_post`) was
/// populated.
#[derive(Clone, Debug)]
pub struct Update {
    pub chat_id: i64,
    pub message_id: i64,
    pub user: User,
    pub message: Message,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Blocks until the next update is available, or returns `Ok(None)` if
    /// the update source has been exhausted (e.g. on shutdown).
    async fn next_update(&mut self) -> crate::error::Result<Option<Update>>;

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> crate::error::Result<()>;

    /// `parse_mode` is always `"HTML"` for this bot; admin notifications rely
    /// on it for the `<pre>`/`<a href>` formatting in actor identities.
    async fn send_message(&self, chat_id: i64, text: &str) -> crate::error::Result<()>;

    async fn ban_chat_member(&self, chat_id: i64, user_id: i64) -> crate::error::Result<()>;
}

/// Builds the actor-identity string used in admin notifications (§4.11):
/// `@username` if present, else an HTML-escaped "first last" name linking to
/// `tg://user?id=<id>`, else a bare id fallback wrapped in `<pre>`.
///
/// Grounded on a simpler reference bot's `userToString`, extended to the
/// richer HTML-link form this bot actually sends.
pub fn format_actor(user: &User) -> String {
    if let Some(username) = user.username.as_deref().filter(|u| !u.is_empty()) {
        return format!("@{username}");
    }

    let mut display_name = escape_html(&user.first_name);
    if let Some(last) = user.last_name.as_deref().filter(|l| !l.is_empty()) {
        display_name.push(' ');
        display_name.push_str(&escape_html(last));
    }

    if display_name.is_empty() {
        return format!("<pre>{}</pre>", user.id);
    }

    format!("<a href=\"tg://user?id={}\">{}</a>", user.id, display_name)
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
