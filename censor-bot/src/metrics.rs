//! # Metrics
//!
//! A Prometheus-text-format collector implementing `censor_core::MetricsSink`
//! for the engine's own evaluation metrics, plus a `bot_processed_actions_total`
//! counter the action pipeline records into directly.
//!
//! Rendering follows the gateway's own `get_prometheus_metrics` pattern: plain
//! `String::push_str(&format!(...))` calls, no external Prometheus client
//! library.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use censor_core::MetricsSink;

const DURATION_BUCKETS: [f64; 8] = [1e-6, 1e-5, 1e-4, 1e-3, 1e-2, 0.1, 1.0, 10.0];

#[derive(Default)]
struct Histogram {
    bucket_counts: [u64; DURATION_BUCKETS.len()],
    sum: f64,
    count: u64,
}

impl Histogram {
    fn observe(&mut self, seconds: f64) {
        for (i, bound) in DURATION_BUCKETS.iter().enumerate() {
            if seconds <= *bound {
                self.bucket_counts[i] += 1;
            }
        }
        self.sum += seconds;
        self.count += 1;
    }
}

/// Collects every metric named in the external interfaces surface and
/// renders them as Prometheus text on demand.
pub struct PrometheusMetrics {
    plugin_evaluations: RwLock<HashMap<(String, String), u64>>,
    plugin_durations: RwLock<HashMap<String, Histogram>>,
    plugin_errors: RwLock<HashMap<String, u64>>,
    evaluations: RwLock<HashMap<String, u64>>,
    processed_actions: RwLock<HashMap<(String, String), u64>>,
}

impl PrometheusMetrics {
    pub fn new() -> Self {
        Self {
            plugin_evaluations: RwLock::new(HashMap::new()),
            plugin_durations: RwLock::new(HashMap::new()),
            plugin_errors: RwLock::new(HashMap::new()),
            evaluations: RwLock::new(HashMap::new()),
            processed_actions: RwLock::new(HashMap::new()),
        }
    }

    /// Records one step of the action pipeline (message_processed,
    /// message_deleted, user_banned, admin_notified) with its outcome
    /// (success, failed).
    pub fn record_processed_action(&self, action: &str, status: &str) {
        let mut map = self.processed_actions.write().unwrap();
        *map.entry((action.to_string(), status.to_string())).or_insert(0) += 1;
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("# HELP bot_processed_actions_total Action pipeline steps by outcome.\n");
        out.push_str("# TYPE bot_processed_actions_total counter\n");
        for ((action, status), count) in self.processed_actions.read().unwrap().iter() {
            out.push_str(&format!(
                "bot_processed_actions_total{{action=\"{action}\",status=\"{status}\"}} {count}\n"
            ));
        }

        out.push_str("# HELP censor_plugin_evaluations_total Plugin evaluations by decision.\n");
        out.push_str("# TYPE censor_plugin_evaluations_total counter\n");
        for ((plugin, action), count) in self.plugin_evaluations.read().unwrap().iter() {
            out.push_str(&format!(
                "censor_plugin_evaluations_total{{plugin=\"{plugin}\",action=\"{action}\"}} {count}\n"
            ));
        }

        out.push_str("# HELP censor_plugin_errors_total Plugin evaluations that returned an error.\n");
        out.push_str("# TYPE censor_plugin_errors_total counter\n");
        for (plugin, count) in self.plugin_errors.read().unwrap().iter() {
            out.push_str(&format!("censor_plugin_errors_total{{plugin=\"{plugin}\"}} {count}\n"));
        }

        out.push_str("# HELP censor_evaluations_total Manager-level evaluation outcomes.\n");
        out.push_str("# TYPE censor_evaluations_total counter\n");
        for (result, count) in self.evaluations.read().unwrap().iter() {
            out.push_str(&format!("censor_evaluations_total{{result=\"{result}\"}} {count}\n"));
        }

        out.push_str("# HELP censor_plugin_duration_seconds Plugin evaluation latency.\n");
        out.push_str("# TYPE censor_plugin_duration_seconds histogram\n");
        for (plugin, hist) in self.plugin_durations.read().unwrap().iter() {
            for (i, bound) in DURATION_BUCKETS.iter().enumerate() {
                out.push_str(&format!(
                    "censor_plugin_duration_seconds_bucket{{plugin=\"{plugin}\",le=\"{bound}\"}} {}\n",
                    hist.bucket_counts[i]
                ));
            }
            out.push_str(&format!(
                "censor_plugin_duration_seconds_bucket{{plugin=\"{plugin}\",le=\"+Inf\"}} {}\n",
                hist.count
            ));
            out.push_str(&format!(
                "censor_plugin_duration_seconds_sum{{plugin=\"{plugin}\"}} {}\n",
                hist.sum
            ));
            out.push_str(&format!(
                "censor_plugin_duration_seconds_count{{plugin=\"{plugin}\"}} {}\n",
                hist.count
            ));
        }

        out
    }
}

impl Default for PrometheusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for PrometheusMetrics {
    fn record_plugin_evaluation(&self, plugin: &str, action: &str) {
        let mut map = self.plugin_evaluations.write().unwrap();
        *map.entry((plugin.to_string(), action.to_string())).or_insert(0) += 1;
    }

    fn record_plugin_duration(&self, plugin: &str, duration: Duration) {
        let mut map = self.plugin_durations.write().unwrap();
        map.entry(plugin.to_string())
            .or_default()
            .observe(duration.as_secs_f64());
    }

    fn record_plugin_error(&self, plugin: &str) {
        let mut map = self.plugin_errors.write().unwrap();
        *map.entry(plugin.to_string()).or_insert(0) += 1;
    }

    fn record_evaluation(&self, result: &str) {
        let mut map = self.evaluations.write().unwrap();
        *map.entry(result.to_string()).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_plugin_evaluation_counter() {
        let metrics = PrometheusMetrics::new();
        metrics.record_plugin_evaluation("keyword", "block");
        metrics.record_plugin_evaluation("keyword", "block");
        let rendered = metrics.render();
        assert!(rendered.contains("censor_plugin_evaluations_total{plugin=\"keyword\",action=\"block\"} 2"));
    }

    #[test]
    fn renders_duration_histogram_buckets() {
        let metrics = PrometheusMetrics::new();
        metrics.record_plugin_duration("regex", Duration::from_millis(5));
        let rendered = metrics.render();
        assert!(rendered.contains("censor_plugin_duration_seconds_bucket{plugin=\"regex\",le=\"0.01\""));
        assert!(rendered.contains("censor_plugin_duration_seconds_count{plugin=\"regex\"} 1"));
    }

    #[test]
    fn histogram_buckets_are_not_double_accumulated() {
        // A single 5ms observation falls into the 1e-2, 0.1, 1.0 and 10.0
        // buckets (all bounds >= 5ms), each of which must read 1, not a
        // running sum across those buckets.
        let metrics = PrometheusMetrics::new();
        metrics.record_plugin_duration("regex", Duration::from_millis(5));
        let rendered = metrics.render();
        assert!(rendered.contains("censor_plugin_duration_seconds_bucket{plugin=\"regex\",le=\"0.01\"} 1"));
        assert!(rendered.contains("censor_plugin_duration_seconds_bucket{plugin=\"regex\",le=\"0.1\"} 1"));
        assert!(rendered.contains("censor_plugin_duration_seconds_bucket{plugin=\"regex\",le=\"1\"} 1"));
        assert!(rendered.contains("censor_plugin_duration_seconds_bucket{plugin=\"regex\",le=\"10\"} 1"));
        assert!(rendered.contains("censor_plugin_duration_seconds_bucket{plugin=\"regex\",le=\"+Inf\"} 1"));
        assert!(rendered.contains("censor_plugin_duration_seconds_count{plugin=\"regex\"} 1"));
    }

    #[test]
    fn records_processed_action() {
        let metrics = PrometheusMetrics::new();
        metrics.record_processed_action("message_deleted", "success");
        let rendered = metrics.render();
        assert!(rendered
            .contains("bot_processed_actions_total{action=\"message_deleted\",status=\"success\"} 1"));
    }
}
