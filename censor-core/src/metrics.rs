//! The observability seam the manager emits into (§6 metrics surfaces).
//! Kept as a trait so the engine never depends on a concrete metrics
//! transport — the bot binary supplies a Prometheus-backed implementation;
//! tests use the no-op default.

use std::time::Duration;

pub trait MetricsSink: Send + Sync {
    fn record_plugin_evaluation(&self, _plugin: &str, _action: &str) {}
    fn record_plugin_duration(&self, _plugin: &str, _duration: Duration) {}
    fn record_plugin_error(&self, _plugin: &str) {}
    fn record_evaluation(&self, _result: &str) {}
}

/// Used when no sink is wired up (unit tests, standalone use of the core
/// crate).
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {}
