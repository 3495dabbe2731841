//! Prometheus metrics for casewatch.
//!
//! Covers:
//! - Fetches per resource and outcome, with latency
//! - Invalidations that joined an in-flight fetch instead of issuing a new one
//! - Live channel state, reconnects and dropped messages
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means
//! duplicate metric names, a startup-time programming error. These panics
//! only occur during static initialization, never at runtime.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram_vec,
    register_int_gauge, CounterVec, Encoder, Gauge, GaugeVec, HistogramVec, IntGauge, TextEncoder,
};

/// Total fetches completed.
/// Labels: resource, outcome (ok/network/http/parse/cancelled)
pub static FETCH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "casewatch_fetch_total",
        "Total fetches completed by resource and outcome",
        &["resource", "outcome"]
    )
    .unwrap()
});

/// Fetch latency in milliseconds.
pub static FETCH_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "casewatch_fetch_latency_ms",
        "Fetch latency in milliseconds",
        &["resource"],
        vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap()
});

/// Fetch requests that found a fetch already in flight.
/// Labels: resource, origin (tick/invalidate)
pub static FETCH_DEDUPLICATED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "casewatch_fetch_deduplicated_total",
        "Fetch requests joined to an in-flight fetch",
        &["resource", "origin"]
    )
    .unwrap()
});

/// Number of cache entries with at least one subscriber.
pub static CACHE_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("casewatch_cache_entries", "Live polling cache entries").unwrap()
});

/// Live channel connection state (1 = connected, 0 = not connected).
pub static LIVE_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "casewatch_live_connected",
        "Live channel connection state (1=connected)"
    )
    .unwrap()
});

/// Live channel state machine current state.
/// Labels: state (disconnected/connecting/connected/reconnecting/failed)
pub static LIVE_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "casewatch_live_state",
        "Live channel state machine current state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

/// Total live channel reconnection attempts.
pub static LIVE_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "casewatch_live_reconnect_total",
        "Total live channel reconnection attempts",
        &["reason"]
    )
    .unwrap()
});

/// Live channel messages received.
/// Labels: kind (event type, "unknown" or "malformed")
pub static LIVE_MESSAGES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "casewatch_live_messages_total",
        "Live channel messages received by kind",
        &["kind"]
    )
    .unwrap()
});

const LIVE_STATES: [&str; 5] = [
    "disconnected",
    "connecting",
    "connected",
    "reconnecting",
    "failed",
];

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record a completed fetch.
    pub fn fetch_completed(resource: &str, outcome: &str, latency_ms: f64) {
        FETCH_TOTAL.with_label_values(&[resource, outcome]).inc();
        FETCH_LATENCY_MS
            .with_label_values(&[resource])
            .observe(latency_ms);
    }

    /// Record a fetch request that joined an in-flight fetch.
    pub fn fetch_deduplicated(resource: &str, origin: &str) {
        FETCH_DEDUPLICATED_TOTAL
            .with_label_values(&[resource, origin])
            .inc();
    }

    /// Set the number of live cache entries.
    pub fn cache_entries(count: usize) {
        CACHE_ENTRIES.set(count as i64);
    }

    /// Set live channel state machine state.
    /// Only the active state is set to 1, all others to 0.
    pub fn live_state_set(state: &str) {
        for s in &LIVE_STATES {
            LIVE_STATE.with_label_values(&[s]).set(0.0);
        }
        LIVE_STATE.with_label_values(&[state]).set(1.0);
        LIVE_CONNECTED.set(if state == "connected" { 1.0 } else { 0.0 });
    }

    /// Record live channel reconnection.
    pub fn live_reconnect(reason: &str) {
        LIVE_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record a received live channel message.
    pub fn live_message(kind: &str) {
        LIVE_MESSAGES_TOTAL.with_label_values(&[kind]).inc();
    }
}

/// Render the default registry in the Prometheus text format.
pub fn gather_text() -> TelemetryResult<String> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buf = Vec::new();
    encoder
        .encode(&families, &mut buf)
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
}
