//! In-process request and domain counters.
//!
//! Counters are keyed by name and a sorted label set and exported in the
//! Prometheus text exposition format.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::{Arc, Mutex};

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const EMAIL_FETCH_TOTAL: &str = "email_fetch_total";
pub const EMAIL_DELETE_TOTAL: &str = "email_delete_total";
pub const EMAIL_MOVE_TOTAL: &str = "email_move_total";

/// Content type of [`Metrics::render`] output.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const HELP: [(&str, &str); 4] = [
    (HTTP_REQUESTS_TOTAL, "Total HTTP requests"),
    (EMAIL_FETCH_TOTAL, "Emails fetched"),
    (EMAIL_DELETE_TOTAL, "Emails deleted"),
    (EMAIL_MOVE_TOTAL, "Emails moved"),
];

type Labels = Vec<(&'static str, String)>;

/// Shared counter registry.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    counters: Arc<Mutex<BTreeMap<&'static str, BTreeMap<Labels, u64>>>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `by` to a counter.
    pub fn inc_by(&self, name: &'static str, labels: &[(&'static str, &str)], by: u64) {
        let mut key: Labels = labels.iter().map(|(k, v)| (*k, v.to_string())).collect();
        key.sort();

        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *counters.entry(name).or_default().entry(key).or_insert(0) += by;
    }

    pub fn inc(&self, name: &'static str, labels: &[(&'static str, &str)]) {
        self.inc_by(name, labels, 1);
    }

    pub fn record_request(&self, method: &str, status: u16) {
        self.inc(
            HTTP_REQUESTS_TOTAL,
            &[("method", method), ("status", &status.to_string())],
        );
    }

    pub fn record_fetch(&self, sample: bool, count: usize) {
        let source = if sample { "sample" } else { "live" };
        self.inc_by(EMAIL_FETCH_TOTAL, &[("source", source)], count as u64);
    }

    pub fn record_delete(&self, remote: bool, count: usize) {
        self.inc_by(EMAIL_DELETE_TOTAL, &[("remote", flag(remote))], count as u64);
    }

    pub fn record_move(&self, remote: bool, count: usize) {
        self.inc_by(EMAIL_MOVE_TOTAL, &[("remote", flag(remote))], count as u64);
    }

    /// Current value of a counter, zero when never incremented.
    pub fn get(&self, name: &str, labels: &[(&'static str, &str)]) -> u64 {
        let mut key: Labels = labels.iter().map(|(k, v)| (*k, v.to_string())).collect();
        key.sort();
        let counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        counters
            .get(name)
            .and_then(|series| series.get(&key))
            .copied()
            .unwrap_or(0)
    }

    /// Renders every counter in Prometheus text format.
    pub fn render(&self) -> String {
        let counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut out = String::new();
        for (name, help) in HELP {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            let Some(series) = counters.get(name) else {
                continue;
            };
            for (labels, value) in series {
                let _ = writeln!(out, "{name}{} {value}", format_labels(labels));
            }
        }
        out
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn format_labels(labels: &Labels) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let inner: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", escape(v)))
        .collect();
    format!("{{{}}}", inner.join(","))
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn counters_accumulate_per_label_set() {
        let metrics = Metrics::new();
        metrics.record_request("GET", 200);
        metrics.record_request("GET", 200);
        metrics.record_request("POST", 404);

        assert_eq!(
            metrics.get(HTTP_REQUESTS_TOTAL, &[("status", "200"), ("method", "GET")]),
            2
        );
        assert_eq!(
            metrics.get(HTTP_REQUESTS_TOTAL, &[("method", "POST"), ("status", "404")]),
            1
        );
        assert_eq!(metrics.get(EMAIL_FETCH_TOTAL, &[("source", "live")]), 0);
    }

    #[test]
    fn render_exposition_format() {
        let metrics = Metrics::new();
        metrics.record_fetch(true, 3);
        metrics.record_delete(false, 2);

        let text = metrics.render();
        assert!(text.contains("# TYPE email_fetch_total counter\n"));
        assert!(text.contains("email_fetch_total{source=\"sample\"} 3\n"));
        assert!(text.contains("email_delete_total{remote=\"False\"} 2\n"));
        assert!(text.contains("# HELP email_move_total Emails moved\n"));
    }

    #[test]
    fn label_values_are_escaped() {
        assert_eq!(escape("a\"b\\c"), "a\\\"b\\\\c");
    }
}
