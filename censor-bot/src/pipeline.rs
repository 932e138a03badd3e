//! # Action Pipeline (§4.11)
//!
//! Turns a plugin-manager decision into side effects against the chat
//! platform: delete the offending message, notify the admin chat, track the
//! violation, and escalate to a ban once the user crosses the threshold.
//!
//! Every step emits a `(action, status)` counter into metrics, the same
//! shape the gateway's own request handlers use for per-step success/failure
//! tracking.

use std::sync::Arc;

use censor_core::stores::violation::ViolationStore;
use censor_core::{Action, PluginManager};
use tracing::{info, warn};
use uuid::Uuid;

use crate::metrics::PrometheusMetrics;
use crate::platform::{format_actor, ChatClient, Update, User};

pub struct Pipeline {
    manager: Arc<PluginManager>,
    violations: Arc<ViolationStore>,
    metrics: Arc<PrometheusMetrics>,
    admin_id: i64,
    ban_threshold: u32,
}

impl Pipeline {
    pub fn new(
        manager: Arc<PluginManager>,
        violations: Arc<ViolationStore>,
        metrics: Arc<PrometheusMetrics>,
        admin_id: i64,
        ban_threshold: u8,
    ) -> Self {
        Self {
            manager,
            violations,
            metrics,
            admin_id,
            ban_threshold: ban_threshold as u32,
        }
    }

    /// Processes one update end to end. Errors returned here are update-
    /// fatal (§4.11 step 1); they are logged by the caller and the update
    /// loop moves on to the next update.
    pub async fn process(&self, client: &dyn ChatClient, update: Update) -> crate::error::Result<()> {
        let correlation_id = Uuid::new_v4();
        let _span = tracing::info_span!("pipeline", correlation_id = %correlation_id, chat_id = update.chat_id, user_id = update.user.id).entered();

        if update.user.id == self.admin_id {
            self.record("message_processed", true);
            return Ok(());
        }

        let decision = self.manager.evaluate(&update.message).await;
        match decision.action {
            Action::Allow | Action::Skip => {
                self.record("message_processed", true);
                Ok(())
            }
            Action::Block => self.on_block(client, &update, &decision.reason, &decision.plugin).await,
        }
    }

    async fn on_block(
        &self,
        client: &dyn ChatClient,
        update: &Update,
        reason: &str,
        plugin: &str,
    ) -> crate::error::Result<()> {
        if let Err(e) = client.delete_message(update.chat_id, update.message_id).await {
            self.record("message_deleted", false);
            warn!(error = %e, "failed to delete message");
            return Err(e);
        }
        self.record("message_deleted", true);

        let notice = self.format_notice(&update.user, plugin, reason, update.message.text_or_caption());
        match client.send_message(self.admin_id, &notice).await {
            Ok(()) => self.record("admin_notified", true),
            Err(e) => {
                self.record("admin_notified", false);
                warn!(error = %e, "failed to notify admin of blocked message");
            }
        }

        let count = self.violations.get_or_set(&update.user.id.to_string());
        info!(count, "violation recorded");

        if count >= self.ban_threshold {
            match client.ban_chat_member(update.chat_id, update.user.id).await {
                Ok(()) => {
                    self.record("user_banned", true);
                    let banned_notice = format!("Banned {}", format_actor(&update.user));
                    let _ = client.send_message(self.admin_id, &banned_notice).await;
                }
                Err(e) => {
                    self.record("user_banned", false);
                    warn!(error = %e, "failed to ban user past violation threshold");
                }
            }
        }

        self.record("message_processed", true);
        Ok(())
    }

    fn format_notice(&self, user: &User, plugin: &str, reason: &str, text: &str) -> String {
        format!(
            "Removed message from {}\nplugin: {}\nreason: {}\n<pre>{}</pre>",
            format_actor(user),
            plugin,
            crate::platform::escape_html(reason),
            crate::platform::escape_html(text)
        )
    }

    fn record(&self, action: &str, success: bool) {
        self.metrics
            .record_processed_action(action, if success { "success" } else { "failed" });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use censor_core::{ManagerConfig, Message, Strategy};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    struct RecordingClient {
        deleted: StdMutex<Vec<(i64, i64)>>,
        sent: StdMutex<Vec<(i64, String)>>,
        banned: StdMutex<Vec<(i64, i64)>>,
        fail_delete: bool,
    }

    impl RecordingClient {
        fn new(fail_delete: bool) -> Self {
            Self {
                deleted: StdMutex::new(Vec::new()),
                sent: StdMutex::new(Vec::new()),
                banned: StdMutex::new(Vec::new()),
                fail_delete,
            }
        }
    }

    #[async_trait]
    impl ChatClient for RecordingClient {
        async fn next_update(&mut self) -> crate::error::Result<Option<Update>> {
            Ok(None)
        }

        async fn delete_message(&self, chat_id: i64, message_id: i64) -> crate::error::Result<()> {
            if self.fail_delete {
                return Err(crate::error::Error::Telegram("boom".into()));
            }
            self.deleted.lock().unwrap().push((chat_id, message_id));
            Ok(())
        }

        async fn send_message(&self, chat_id: i64, text: &str) -> crate::error::Result<()> {
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }

        async fn ban_chat_member(&self, chat_id: i64, user_id: i64) -> crate::error::Result<()> {
            self.banned.lock().unwrap().push((chat_id, user_id));
            Ok(())
        }
    }

    fn update(user_id: i64, text: &str) -> Update {
        Update {
            chat_id: 10,
            message_id: 20,
            user: User {
                id: user_id,
                username: Some("spammer".to_string()),
                first_name: "Spam".to_string(),
                last_name: None,
            },
            message: Message {
                text: text.to_string(),
                chat_id: 10,
                message_id: 20,
                user_id,
                ..Default::default()
            },
        }
    }

    async fn manager_blocking_everything() -> Arc<PluginManager> {
        let manager = PluginManager::new(ManagerConfig {
            strategy: Strategy::Sequential,
            timeout: Duration::from_secs(1),
            enabled_only: true,
            error_action: Action::Block,
            skip_action: Action::Allow,
        })
        .unwrap();
        let mut config = censor_core::PluginConfigEntry {
            enabled: true,
            ..Default::default()
        };
        config.opts.insert("blacklist".into(), serde_json::json!(["spam"]));
        manager
            .register(censor_core::create_plugin("keyword", &config).unwrap(), config)
            .await
            .unwrap();
        Arc::new(manager)
    }

    #[tokio::test]
    async fn admin_sender_bypasses_plugins_entirely() {
        let manager = manager_blocking_everything().await;
        let violations = Arc::new(ViolationStore::from_url("memory://test?ttl=1h").unwrap());
        let metrics = Arc::new(PrometheusMetrics::new());
        let pipeline = Pipeline::new(manager, violations, metrics.clone(), 99, 3);
        let client = RecordingClient::new(false);

        pipeline.process(&client, update(99, "spam")).await.unwrap();

        assert!(client.deleted.lock().unwrap().is_empty());
        let rendered = metrics.render();
        assert!(rendered.contains("bot_processed_actions_total{action=\"message_processed\",status=\"success\"} 1"));
    }

    #[tokio::test]
    async fn block_deletes_notifies_and_counts_violation() {
        let manager = manager_blocking_everything().await;
        let violations = Arc::new(ViolationStore::from_url("memory://test?ttl=1h").unwrap());
        let metrics = Arc::new(PrometheusMetrics::new());
        let pipeline = Pipeline::new(manager, violations, metrics.clone(), 99, 3);
        let client = RecordingClient::new(false);

        pipeline.process(&client, update(1, "this is spam")).await.unwrap();

        assert_eq!(client.deleted.lock().unwrap().len(), 1);
        assert_eq!(client.sent.lock().unwrap().len(), 1);
        assert!(client.banned.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ban_threshold_triggers_ban_and_second_notice() {
        let manager = manager_blocking_everything().await;
        let violations = Arc::new(ViolationStore::from_url("memory://test?ttl=1h").unwrap());
        let metrics = Arc::new(PrometheusMetrics::new());
        let pipeline = Pipeline::new(manager, violations, metrics.clone(), 99, 2);
        let client = RecordingClient::new(false);

        pipeline.process(&client, update(5, "spam")).await.unwrap();
        pipeline.process(&client, update(5, "spam again")).await.unwrap();

        assert_eq!(client.banned.lock().unwrap().len(), 1);
        assert_eq!(client.sent.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn delete_failure_is_fatal_and_skips_remaining_steps() {
        let manager = manager_blocking_everything().await;
        let violations = Arc::new(ViolationStore::from_url("memory://test?ttl=1h").unwrap());
        let metrics = Arc::new(PrometheusMetrics::new());
        let pipeline = Pipeline::new(manager, violations, metrics.clone(), 99, 3);
        let client = RecordingClient::new(true);

        let result = pipeline.process(&client, update(1, "spam")).await;

        assert!(result.is_err());
        assert!(client.sent.lock().unwrap().is_empty());
    }
}
