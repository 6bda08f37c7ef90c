//! Metrics and observability (§10.6): a hand-rolled Prometheus text-format
//! collector, grounded on the teacher's `metrics.rs` `MetricsCollector` /
//! `get_prometheus_metrics` / `OnceLock<Arc<RwLock<_>>>` pattern rather than
//! pulling in the `prometheus` crate, since the teacher never depends on one
//! either.
//!
//! Tracked series (§10.6, §4.1, §4.4):
//! - `hookrelay_ingest_status_total{code}` — per-status-code ingest counter.
//! - `hookrelay_events_total{event_type}` — per-event-type counter.
//! - `hookrelay_plugin_handle_duration_seconds{event_type,action,plugin,took_action}`
//! - `hookrelay_plugin_handle_errors_total{event_type,action,plugin,took_action}`
//! - `hookrelay_external_forward_total{outcome}`
//! - `hookrelay_inflight_dispatch_tasks` — gauge.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

static METRICS: OnceLock<Arc<RwLock<DispatchMetrics>>> = OnceLock::new();

fn collector() -> &'static Arc<RwLock<DispatchMetrics>> {
    METRICS.get_or_init(|| Arc::new(RwLock::new(DispatchMetrics::default())))
}

/// Labels for a single handler-duration/error observation (§4.4 step 5).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerLabels {
    pub event_type: String,
    pub action: String,
    pub plugin: String,
    pub took_action: bool,
}

#[derive(Default)]
struct HandlerSeries {
    count: u64,
    total_seconds: f64,
    errors: u64,
}

#[derive(Default)]
pub struct DispatchMetrics {
    ingest_status: HashMap<u16, u64>,
    events: HashMap<String, u64>,
    handlers: HashMap<HandlerLabels, HandlerSeries>,
    external_forward: HashMap<&'static str, u64>,
    inflight: i64,
}

impl DispatchMetrics {
    pub fn record_ingest_status(&mut self, code: u16) {
        *self.ingest_status.entry(code).or_insert(0) += 1;
    }

    pub fn record_event(&mut self, event_type: &str) {
        *self.events.entry(event_type.to_string()).or_insert(0) += 1;
    }

    pub fn record_handler(&mut self, labels: HandlerLabels, duration_secs: f64, errored: bool) {
        let series = self.handlers.entry(labels).or_default();
        series.count += 1;
        series.total_seconds += duration_secs;
        if errored {
            series.errors += 1;
        }
    }

    pub fn record_external_forward(&mut self, outcome: &'static str) {
        *self.external_forward.entry(outcome).or_insert(0) += 1;
    }

    pub fn set_inflight(&mut self, value: i64) {
        self.inflight = value;
    }

    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();

        out.push_str("# HELP hookrelay_ingest_status_total Webhook ingest responses by status code.\n");
        out.push_str("# TYPE hookrelay_ingest_status_total counter\n");
        for (code, count) in sorted_by_key(&self.ingest_status) {
            out.push_str(&format!(
                "hookrelay_ingest_status_total{{code=\"{code}\"}} {count}\n"
            ));
        }

        out.push_str("# HELP hookrelay_events_total Validated webhook deliveries by event type.\n");
        out.push_str("# TYPE hookrelay_events_total counter\n");
        for (event_type, count) in sorted_by_event_key(&self.events) {
            out.push_str(&format!(
                "hookrelay_events_total{{event_type=\"{event_type}\"}} {count}\n"
            ));
        }

        out.push_str("# HELP hookrelay_plugin_handle_duration_seconds Handler invocation duration.\n");
        out.push_str("# TYPE hookrelay_plugin_handle_duration_seconds summary\n");
        out.push_str("# HELP hookrelay_plugin_handle_errors_total Handler invocations that errored or panicked.\n");
        out.push_str("# TYPE hookrelay_plugin_handle_errors_total counter\n");
        let mut handler_rows: Vec<_> = self.handlers.iter().collect();
        handler_rows.sort_by(|(a, _), (b, _)| {
            (&a.plugin, &a.event_type, &a.action).cmp(&(&b.plugin, &b.event_type, &b.action))
        });
        for (labels, series) in handler_rows {
            let label_str = format!(
                "event_type=\"{}\",action=\"{}\",plugin=\"{}\",took_action=\"{}\"",
                labels.event_type, labels.action, labels.plugin, labels.took_action
            );
            out.push_str(&format!(
                "hookrelay_plugin_handle_duration_seconds_sum{{{label_str}}} {}\n",
                series.total_seconds
            ));
            out.push_str(&format!(
                "hookrelay_plugin_handle_duration_seconds_count{{{label_str}}} {}\n",
                series.count
            ));
            out.push_str(&format!(
                "hookrelay_plugin_handle_errors_total{{{label_str}}} {}\n",
                series.errors
            ));
        }

        out.push_str("# HELP hookrelay_external_forward_total External-plugin forward attempts by outcome.\n");
        out.push_str("# TYPE hookrelay_external_forward_total counter\n");
        for (outcome, count) in sorted_by_str_key(&self.external_forward) {
            out.push_str(&format!(
                "hookrelay_external_forward_total{{outcome=\"{outcome}\"}} {count}\n"
            ));
        }

        out.push_str("# HELP hookrelay_inflight_dispatch_tasks Currently running dispatch tasks.\n");
        out.push_str("# TYPE hookrelay_inflight_dispatch_tasks gauge\n");
        out.push_str(&format!("hookrelay_inflight_dispatch_tasks {}\n", self.inflight));

        out
    }
}

fn sorted_by_key(map: &HashMap<u16, u64>) -> Vec<(u16, u64)> {
    let mut rows: Vec<_> = map.iter().map(|(k, v)| (*k, *v)).collect();
    rows.sort_by_key(|(k, _)| *k);
    rows
}

fn sorted_by_str_key(map: &HashMap<&'static str, u64>) -> Vec<(&'static str, u64)> {
    let mut rows: Vec<_> = map.iter().map(|(k, v)| (*k, *v)).collect();
    rows.sort_by_key(|(k, _)| *k);
    rows
}

fn sorted_by_event_key(map: &HashMap<String, u64>) -> Vec<(String, u64)> {
    let mut rows: Vec<_> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
    rows.sort();
    rows
}

pub fn record_ingest_status(code: u16) {
    collector().write().expect("metrics lock poisoned").record_ingest_status(code);
}

pub fn record_event(event_type: &str) {
    collector().write().expect("metrics lock poisoned").record_event(event_type);
}

pub fn record_handler(labels: HandlerLabels, duration_secs: f64, errored: bool) {
    collector()
        .write()
        .expect("metrics lock poisoned")
        .record_handler(labels, duration_secs, errored);
}

pub fn record_external_forward(outcome: &'static str) {
    collector()
        .write()
        .expect("metrics lock poisoned")
        .record_external_forward(outcome);
}

pub fn set_inflight(value: i64) {
    collector().write().expect("metrics lock poisoned").set_inflight(value);
}

pub fn render_prometheus() -> String {
    collector().read().expect("metrics lock poisoned").render_prometheus()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_recorded_series() {
        let mut metrics = DispatchMetrics::default();
        metrics.record_ingest_status(200);
        metrics.record_event("push");
        metrics.record_handler(
            HandlerLabels {
                event_type: "push".to_string(),
                action: "push".to_string(),
                plugin: "size".to_string(),
                took_action: true,
            },
            0.01,
            false,
        );
        metrics.record_external_forward("success");
        metrics.set_inflight(3);

        let rendered = metrics.render_prometheus();
        assert!(rendered.contains("hookrelay_ingest_status_total{code=\"200\"} 1"));
        assert!(rendered.contains("hookrelay_events_total{event_type=\"push\"} 1"));
        assert!(rendered.contains("took_action=\"true\""));
        assert!(rendered.contains("hookrelay_inflight_dispatch_tasks 3"));
    }

    #[test]
    fn event_rows_are_sorted_for_stable_output() {
        assert_eq!(sorted_by_event_key(&HashMap::new()), Vec::<(String, u64)>::new());
    }
}
