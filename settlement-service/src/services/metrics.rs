//! Prometheus metrics for settlement-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Settlement attempts by outcome.
pub static SETTLEMENT_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "settlement_requests_total",
        "Service request settlement attempts by outcome",
        &["status"] // settled, already_settled, not_found, error
    )
    .expect("Failed to register settlement_requests_total")
});

/// Commission rows created, by chain level (bounded at 10 levels).
pub static COMMISSIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "settlement_commissions_total",
        "Commission rows created by chain level",
        &["level"]
    )
    .expect("Failed to register commissions_total")
});

/// Price cascade descendant updates by action.
pub static CASCADE_UPDATES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "settlement_cascade_updates_total",
        "Price cascade descendant updates by action",
        &["action"] // invalidated, retained, failed
    )
    .expect("Failed to register cascade_updates_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "settlement_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&SETTLEMENT_REQUESTS_TOTAL);
    Lazy::force(&COMMISSIONS_TOTAL);
    Lazy::force(&CASCADE_UPDATES_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
