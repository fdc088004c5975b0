//! Prometheus metrics registry and instruments.
//!
//! Recording a metric never fails the operation being measured.

use lazy_static::lazy_static;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Once;
use std::time::Duration;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Entity store
    pub static ref STORE_QUERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("feedline_store_queries_total", "Total number of entity store operations"),
        &["operation"]
    ).expect("metric can be created");
    pub static ref STORE_QUERY_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "feedline_store_query_duration_seconds",
            "Entity store operation duration in seconds"
        ).buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["operation"]
    ).expect("metric can be created");

    // Remote feed
    pub static ref REMOTE_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("feedline_remote_requests_total", "Total number of remote timeline requests"),
        &["status"]
    ).expect("metric can be created");
    pub static ref REMOTE_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "feedline_remote_request_duration_seconds",
            "Remote timeline request duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["status"]
    ).expect("metric can be created");

    // Sync engine
    pub static ref LOCAL_READ_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("feedline_local_read_failures_total", "Local cache reads that failed and were treated as empty"),
        &["operation"]
    ).expect("metric can be created");
    pub static ref WRITE_BACK_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("feedline_write_back_failures_total", "Fetched pages that could not be persisted"),
        &["operation"]
    ).expect("metric can be created");
    pub static ref TIMELINE_STAGES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("feedline_timeline_stages_total", "Timeline stages emitted to callers"),
        &["operation", "stage"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(STORE_QUERIES_TOTAL.clone()),
            Box::new(STORE_QUERY_DURATION_SECONDS.clone()),
            Box::new(REMOTE_REQUESTS_TOTAL.clone()),
            Box::new(REMOTE_REQUEST_DURATION_SECONDS.clone()),
            Box::new(LOCAL_READ_FAILURES_TOTAL.clone()),
            Box::new(WRITE_BACK_FAILURES_TOTAL.clone()),
            Box::new(TIMELINE_STAGES_TOTAL.clone()),
        ];

        for collector in collectors {
            if let Err(error) = REGISTRY.register(collector) {
                tracing::warn!(%error, "Failed to register metric");
            }
        }

        tracing::info!("Metrics registry initialized");
    });
}

/// Render all registered metrics in the Prometheus text format
pub fn gather_text() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(error) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::warn!(%error, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn observe_store_query(operation: &str, elapsed: Duration) {
    STORE_QUERIES_TOTAL.with_label_values(&[operation]).inc();
    STORE_QUERY_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(elapsed.as_secs_f64());
}

pub fn observe_remote_request(status: &str, elapsed: Duration) {
    REMOTE_REQUESTS_TOTAL.with_label_values(&[status]).inc();
    REMOTE_REQUEST_DURATION_SECONDS
        .with_label_values(&[status])
        .observe(elapsed.as_secs_f64());
}

pub fn record_local_read_failure(operation: &str) {
    LOCAL_READ_FAILURES_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn record_write_back_failure(operation: &str) {
    WRITE_BACK_FAILURES_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn record_stage(operation: &str, stage: &str) {
    TIMELINE_STAGES_TOTAL
        .with_label_values(&[operation, stage])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_text_includes_recorded_counters() {
        init_metrics();
        init_metrics();
        record_write_back_failure("load_latest");

        let text = gather_text();
        assert!(text.contains("feedline_write_back_failures_total"));
    }
}
