//! The plugin manager / evaluator (§4.2): registration, ordering, strategy
//! dispatch, timeout enforcement, aggregation, and periodic cleanup.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::message::{Action, Decision, Message};
use crate::metrics::{MetricsSink, NoopMetricsSink};
use crate::plugin::{EvalContext, Plugin, PluginConfigEntry};
use crate::plugins::BuiltinPlugin;

/// §3 Manager config: `strategy`, `timeout`, `enabled-only`, the two
/// fallback actions. `plugins: name -> plugin-config` lives alongside the
/// registered plugin set itself (see `register`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    Sequential,
    Parallel,
}

impl Strategy {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "sequential" => Ok(Strategy::Sequential),
            "parallel" => Ok(Strategy::Parallel),
            other => Err(Error::InvalidStrategy(other.to_string())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ManagerConfig {
    pub strategy: Strategy,
    pub timeout: Duration,
    pub enabled_only: bool,
    pub error_action: Action,
    pub skip_action: Action,
}

impl ManagerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig("manager timeout must be > 0".into()));
        }
        for action in [self.error_action, self.skip_action] {
            if action == Action::Skip {
                return Err(Error::InvalidConfig(
                    "error_action/skip_action must be allow or block, not skip".into(),
                ));
            }
        }
        Ok(())
    }
}

struct Registered {
    plugin: Arc<BuiltinPlugin>,
    config: PluginConfigEntry,
    insertion_order: usize,
}

impl Registered {
    fn effective_priority(&self) -> i32 {
        self.config.priority_override.unwrap_or_else(|| self.plugin.priority())
    }
}

pub struct PluginManager {
    config: ManagerConfig,
    plugins: RwLock<Vec<Registered>>,
    metrics: Arc<dyn MetricsSink>,
    next_insertion_order: std::sync::atomic::AtomicUsize,
    cleanup_handle: tokio::sync::Mutex<Option<(JoinHandle<()>, mpsc::Sender<()>)>>,
}

impl PluginManager {
    pub fn new(config: ManagerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_metrics(config, Arc::new(NoopMetricsSink)))
    }

    pub fn with_metrics(config: ManagerConfig, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            config,
            plugins: RwLock::new(Vec::new()),
            metrics,
            next_insertion_order: std::sync::atomic::AtomicUsize::new(0),
            cleanup_handle: tokio::sync::Mutex::new(None),
        }
    }

    /// Registers a constructed plugin under its own `name()`. Fails with
    /// `already-exists` on a name collision.
    pub async fn register(&self, plugin: BuiltinPlugin, config: PluginConfigEntry) -> Result<()> {
        let mut plugins = self.plugins.write().await;
        if plugins.iter().any(|r| r.plugin.name() == plugin.name()) {
            return Err(Error::AlreadyExists(plugin.name().to_string()));
        }
        let insertion_order = self
            .next_insertion_order
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        plugins.push(Registered {
            plugin: Arc::new(plugin),
            config,
            insertion_order,
        });
        Ok(())
    }

    async fn selected(&self) -> Vec<usize> {
        let plugins = self.plugins.read().await;
        let mut indices: Vec<usize> = (0..plugins.len())
            .filter(|&i| !self.config.enabled_only || plugins[i].config.enabled)
            .collect();
        indices.sort_by_key(|&i| (plugins[i].effective_priority(), plugins[i].insertion_order));
        indices
    }

    /// §4.2 `Evaluate`: select, dispatch, substitute fallback actions,
    /// record the total-evaluation metric.
    pub async fn evaluate(&self, msg: &Message) -> Decision {
        let selected = self.selected().await;
        if selected.is_empty() {
            let decision = Decision::skip("manager");
            self.metrics.record_evaluation(self.config.skip_action.as_str());
            return Decision {
                action: self.config.skip_action,
                reason: "no plugins registered".to_string(),
                ..decision
            };
        }

        let ctx = EvalContext::with_timeout(self.config.timeout);

        let outcome = match self.config.strategy {
            Strategy::Sequential => self.evaluate_sequential(&ctx, msg, &selected).await,
            Strategy::Parallel => self.evaluate_parallel(&ctx, msg, &selected).await,
        };

        let decision = match outcome {
            Err(e) => Decision {
                action: self.config.error_action,
                reason: e.to_string(),
                metadata: Default::default(),
                plugin: "manager".to_string(),
            },
            Ok(decision) if decision.action == Action::Skip => Decision {
                action: self.config.skip_action,
                plugin: "manager".to_string(),
                ..decision
            },
            Ok(decision) => decision,
        };

        self.metrics.record_evaluation(decision.action.as_str());
        decision
    }

    /// Iterate selected plugins by effective priority. The first `allow`
    /// short-circuits; a `block` is remembered but does not stop the loop,
    /// so a later `allow` can still override it.
    async fn evaluate_sequential(
        &self,
        ctx: &EvalContext,
        msg: &Message,
        selected: &[usize],
    ) -> Result<Decision> {
        let ordered: Vec<Arc<BuiltinPlugin>> = {
            let plugins = self.plugins.read().await;
            selected.iter().map(|&i| Arc::clone(&plugins[i].plugin)).collect()
        };
        let mut remembered_block: Option<Decision> = None;

        for plugin in &ordered {
            if ctx.expired() {
                return Err(Error::Timeout);
            }
            let started = Instant::now();
            let result = plugin.evaluate(ctx, msg).await;
            let elapsed = started.elapsed();
            self.metrics.record_plugin_duration(plugin.name(), elapsed);

            match result {
                Err(e) => {
                    self.metrics.record_plugin_error(plugin.name());
                    return Err(Error::PluginError {
                        plugin: plugin.name().to_string(),
                        message: e.to_string(),
                    });
                }
                Ok(decision) => {
                    self.metrics
                        .record_plugin_evaluation(plugin.name(), decision.action.as_str());
                    match decision.action {
                        Action::Allow => return Ok(decision),
                        Action::Block => remembered_block = Some(decision),
                        Action::Skip => {}
                    }
                }
            }
        }

        Ok(remembered_block.unwrap_or_else(|| Decision::skip("manager")))
    }

    /// Fan out all selected plugins concurrently; fan in on a channel sized
    /// to the selected count so no writer ever blocks. First collected
    /// `allow` wins the aggregation (not the execution); otherwise any
    /// collected `block` wins; otherwise `skip`.
    async fn evaluate_parallel(
        &self,
        ctx: &EvalContext,
        msg: &Message,
        selected: &[usize],
    ) -> Result<Decision> {
        let ordered: Vec<Arc<BuiltinPlugin>> = {
            let plugins = self.plugins.read().await;
            selected.iter().map(|&i| Arc::clone(&plugins[i].plugin)).collect()
        };
        let (tx, mut rx) = mpsc::channel::<Result<Decision>>(ordered.len().max(1));

        for plugin in ordered {
            let tx = tx.clone();
            let msg = msg.clone();
            let ctx = *ctx;
            let plugin_name = plugin.name().to_string();
            let metrics = Arc::clone(&self.metrics);
            tokio::spawn(async move {
                let started = Instant::now();
                let result = plugin.evaluate(&ctx, &msg).await;
                let elapsed = started.elapsed();
                metrics.record_plugin_duration(&plugin_name, elapsed);
                match &result {
                    Ok(decision) => metrics.record_plugin_evaluation(&plugin_name, decision.action.as_str()),
                    Err(_) => metrics.record_plugin_error(&plugin_name),
                }
                let _ = tx
                    .send(result.map_err(|e| Error::PluginError {
                        plugin: plugin_name.clone(),
                        message: e.to_string(),
                    }))
                    .await;
            });
        }
        drop(tx);

        let mut saw_block: Option<Decision> = None;
        for _ in 0..selected.len() {
            let remaining = ctx.remaining();
            let received = tokio::time::timeout(remaining, rx.recv()).await;
            let Ok(Some(result)) = received else {
                return Err(Error::Timeout);
            };
            match result? {
                decision if decision.action == Action::Allow => return Ok(decision),
                decision if decision.action == Action::Block => saw_block = Some(decision),
                _ => {}
            }
        }

        Ok(saw_block.unwrap_or_else(|| Decision::skip("manager")))
    }

    /// Starts the background cleanup ticker (default every minute).
    /// Idempotent: a second call while one is running is a no-op.
    pub async fn start_cleanup(self: &Arc<Self>, interval: Duration) {
        let mut handle = self.cleanup_handle.lock().await;
        if handle.is_some() {
            return;
        }
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let manager = Arc::clone(self);
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let plugins = manager.plugins.read().await;
                        for registered in plugins.iter() {
                            registered.plugin.cleanup().await;
                        }
                        debug!("plugin cleanup tick completed");
                    }
                    _ = stop_rx.recv() => {
                        break;
                    }
                }
            }
        });
        *handle = Some((join, stop_tx));
    }

    /// Stops the cleanup ticker and waits for its loop to exit.
    /// Idempotent: a stop with nothing running is a no-op.
    pub async fn stop_cleanup(&self) {
        let mut handle = self.cleanup_handle.lock().await;
        if let Some((join, stop_tx)) = handle.take() {
            let _ = stop_tx.send(()).await;
            if let Err(e) = join.await {
                warn!("cleanup task panicked: {e}");
            }
        }
    }
}
