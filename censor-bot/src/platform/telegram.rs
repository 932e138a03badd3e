//! A `reqwest`-based `ChatClient` for the Telegram Bot API.
//!
//! Token-in-path auth, one call per RPC, no retries — the same trimmed-down
//! shape the engine's own `HttpClient` uses for the LLM plugin's remote
//! call, applied here to `getUpdates`/`deleteMessage`/`sendMessage`/
//! `banChatMember`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{ChatClient, Update, User};
use crate::error::Error;

const API_BASE: &str = "https://api.telegram.org";

pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    offset: i64,
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> crate::error::Result<Self> {
        Self::with_base_url(token, API_BASE)
    }

    /// Used by tests to point at a mock server instead of the real API.
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> crate::error::Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Telegram(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
            offset: 0,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token)
    }

    async fn call<T: serde::de::DeserializeOwned>(&self, method: &str, body: serde_json::Value) -> crate::error::Result<T> {
        let response = self
            .http
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Telegram(format!("{method} request failed: {e}")))?;

        let envelope: TelegramResponse<T> = response
            .json()
            .await
            .map_err(|e| Error::Telegram(format!("{method} response decode failed: {e}")))?;

        if !envelope.ok {
            return Err(Error::Telegram(format!(
                "{method} failed: {}",
                envelope.description.unwrap_or_default()
            )));
        }

        envelope
            .result
            .ok_or_else(|| Error::Telegram(format!("{method} returned no result")))
    }
}

#[derive(Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Deserialize)]
struct RawUpdate {
    update_id: i64,
    message: Option<RawMessage>,
    edited_message: Option<RawMessage>,
    channel_post: Option<RawMessage>,
    edited_channel_post: Option<RawMessage>,
}

#[derive(Deserialize)]
struct RawMessage {
    message_id: i64,
    #[serde(default)]
    text: String,
    #[serde(default)]
    caption: String,
    from: Option<RawUser>,
    chat: RawChat,
    forward_from: Option<RawUser>,
    forward_from_chat: Option<RawChat>,
}

#[derive(Deserialize)]
struct RawUser {
    id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: Option<String>,
}

#[derive(Deserialize)]
struct RawChat {
    id: i64,
}

fn narrow(raw: RawUpdate) -> Option<(RawMessage, bool)> {
    if let Some(m) = raw.message {
        return Some((m, false));
    }
    if let Some(m) = raw.edited_message {
        return Some((m, true));
    }
    if let Some(m) = raw.channel_post {
        return Some((m, false));
    }
    if let Some(m) = raw.edited_channel_post {
        return Some((m, true));
    }
    None
}

#[async_trait]
impl ChatClient for TelegramClient {
    async fn next_update(&mut self) -> crate::error::Result<Option<Update>> {
        let updates: Vec<RawUpdate> = self
            .call(
                "getUpdates",
                json!({ "offset": self.offset, "timeout": 30 }),
            )
            .await?;

        let Some(raw) = updates.into_iter().next() else {
            return Ok(None);
        };
        self.offset = raw.update_id + 1;

        let Some((raw_message, is_edit)) = narrow(raw) else {
            return Ok(None);
        };

        let user = raw_message
            .from
            .map(|u| User {
                id: u.id,
                username: u.username,
                first_name: u.first_name,
                last_name: u.last_name,
            })
            .unwrap_or_default();

        let message = censor_core::Message {
            text: raw_message.text,
            caption: raw_message.caption,
            user_id: user.id,
            chat_id: raw_message.chat.id,
            message_id: raw_message.message_id,
            is_edit,
            forwarded_from_user_id: raw_message.forward_from.map(|u| u.id),
            forwarded_from_chat_id: raw_message.forward_from_chat.map(|c| c.id),
        };

        Ok(Some(Update {
            chat_id: raw_message.chat.id,
            message_id: raw_message.message_id,
            user,
            message,
        }))
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> crate::error::Result<()> {
        let _: bool = self
            .call(
                "deleteMessage",
                json!({ "chat_id": chat_id, "message_id": message_id }),
            )
            .await?;
        Ok(())
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> crate::error::Result<()> {
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                json!({ "chat_id": chat_id, "text": text, "parse_mode": "HTML" }),
            )
            .await?;
        Ok(())
    }

    async fn ban_chat_member(&self, chat_id: i64, user_id: i64) -> crate::error::Result<()> {
        let _: bool = self
            .call(
                "banChatMember",
                json!({ "chat_id": chat_id, "user_id": user_id }),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn delete_message_succeeds_on_ok_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/deleteMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": true })))
            .mount(&server)
            .await;

        let client = TelegramClient::with_base_url("test-token", server.uri()).unwrap();
        client.delete_message(1, 2).await.unwrap();
    }

    #[tokio::test]
    async fn rpc_failure_surfaces_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/deleteMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": false,
                "description": "message to delete not found"
            })))
            .mount(&server)
            .await;

        let client = TelegramClient::with_base_url("test-token", server.uri()).unwrap();
        let err = client.delete_message(1, 2).await.unwrap_err();
        assert!(matches!(err, Error::Telegram(ref msg) if msg.contains("message to delete not found")));
    }

    #[tokio::test]
    async fn next_update_narrows_to_message_field_and_advances_offset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [{
                    "update_id": 42,
                    "message": {
                        "message_id": 7,
                        "text": "hello",
                        "from": { "id": 5, "username": "alice", "first_name": "Alice" },
                        "chat": { "id": 100 },
                    }
                }]
            })))
            .mount(&server)
            .await;

        let mut client = TelegramClient::with_base_url("test-token", server.uri()).unwrap();
        let update = client.next_update().await.unwrap().unwrap();
        assert_eq!(update.chat_id, 100);
        assert_eq!(update.message.text, "hello");
        assert_eq!(update.user.username.as_deref(), Some("alice"));
        assert_eq!(client.offset, 43);
    }
}
