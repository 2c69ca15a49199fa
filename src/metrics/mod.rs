//! Prometheus metrics for probing, selection and redirects
//!
//! Call [`init_metrics`] once at startup. If registration fails the error is
//! logged and every `record_*` function becomes a no-op, so measuring and
//! serving keep working without metrics.

use prometheus::{
    register_counter, register_counter_vec, register_gauge_vec, register_histogram, Counter,
    CounterVec, Encoder, GaugeVec, Histogram, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;

// ============================================================================
// Metrics Storage
// ============================================================================

struct Metrics {
    probes: CounterVec,
    samples: CounterVec,
    cycles: Counter,
    cycle_duration: Histogram,
    publishes: CounterVec,
    selected_latency: GaugeVec,
    redirects: CounterVec,
}

static METRICS: OnceLock<Option<Metrics>> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

fn register() -> Result<Metrics, prometheus::Error> {
    Ok(Metrics {
        probes: register_counter_vec!(
            "fastmirror_probes_total",
            "Latency probes by group and outcome",
            &["group", "outcome"]
        )?,
        samples: register_counter_vec!(
            "fastmirror_samples_total",
            "Throughput samples by group and outcome",
            &["group", "outcome"]
        )?,
        cycles: register_counter!(
            "fastmirror_refresh_cycles_total",
            "Completed refresh cycles"
        )?,
        cycle_duration: register_histogram!(
            "fastmirror_refresh_cycle_duration_seconds",
            "Wall-clock time of a refresh cycle in seconds",
            vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
        )?,
        publishes: register_counter_vec!(
            "fastmirror_publish_total",
            "Selection store publications by group and outcome",
            &["group", "outcome"]
        )?,
        selected_latency: register_gauge_vec!(
            "fastmirror_selected_latency_ms",
            "Probe latency of the currently selected mirror",
            &["group"]
        )?,
        redirects: register_counter_vec!(
            "fastmirror_redirects_total",
            "Redirect responses by group and status code",
            &["group", "status"]
        )?,
    })
}

/// Register all metrics with the default registry
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    METRICS.get_or_init(|| match register() {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            tracing::warn!(error = %e, "Metrics initialization failed, metrics disabled");
            None
        }
    });
}

fn metrics() -> Option<&'static Metrics> {
    METRICS.get().and_then(Option::as_ref)
}

// ============================================================================
// Recording
// ============================================================================

pub fn record_probe(group: &str, outcome: &str) {
    if let Some(m) = metrics() {
        m.probes.with_label_values(&[group, outcome]).inc();
    }
}

pub fn record_sample(group: &str, outcome: &str) {
    if let Some(m) = metrics() {
        m.samples.with_label_values(&[group, outcome]).inc();
    }
}

pub fn record_cycle(duration: Duration) {
    if let Some(m) = metrics() {
        m.cycles.inc();
        m.cycle_duration.observe(duration.as_secs_f64());
    }
}

pub fn record_publish(group: &str, outcome: &str) {
    if let Some(m) = metrics() {
        m.publishes.with_label_values(&[group, outcome]).inc();
    }
}

pub fn set_selected_latency(group: &str, latency_ms: u64) {
    if let Some(m) = metrics() {
        m.selected_latency
            .with_label_values(&[group])
            .set(latency_ms as f64);
    }
}

pub fn record_redirect(group: &str, status: u16) {
    if let Some(m) = metrics() {
        let status = status.to_string();
        m.redirects
            .with_label_values(&[group, status.as_str()])
            .inc();
    }
}

// ============================================================================
// Export
// ============================================================================

/// Text exposition of every registered metric
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
