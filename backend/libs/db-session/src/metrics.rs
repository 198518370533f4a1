//! Prometheus metrics for request-scoped connections
//!
//! Tracks connect latency, connect errors and connections currently open.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, HistogramVec,
    IntCounterVec, IntGaugeVec,
};
use std::time::Duration;

use crate::DbError;

/// Time to open a fresh connection to PostgreSQL
static DB_CONNECT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "db_session_connect_duration_seconds",
        "Time to open a request-scoped database connection",
        &["service"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
    )
    .expect("Prometheus metrics registration should succeed at startup")
});

static DB_CONNECT_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "db_session_connect_errors_total",
        "Request-scoped connection failures",
        &["service", "error_type"]
    )
    .expect("Prometheus metrics registration should succeed at startup")
});

/// Connections opened by in-flight requests and not yet released
static DB_OPEN_CONNECTIONS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "db_session_open_connections",
        "Request-scoped connections currently open",
        &["service"]
    )
    .expect("Prometheus metrics registration should succeed at startup")
});

pub(crate) fn record_connect(service: &str, elapsed: Duration, error: Option<&DbError>) {
    DB_CONNECT_DURATION
        .with_label_values(&[service])
        .observe(elapsed.as_secs_f64());

    if let Some(e) = error {
        let error_type = match e {
            DbError::ConnectTimeout(_) => "timeout",
            DbError::Connect(_) => "connect",
            DbError::Released => "released",
        };
        DB_CONNECT_ERRORS
            .with_label_values(&[service, error_type])
            .inc();
    }
}

pub(crate) fn connection_opened(service: &str) {
    DB_OPEN_CONNECTIONS.with_label_values(&[service]).inc();
}

pub(crate) fn connection_closed(service: &str) {
    DB_OPEN_CONNECTIONS.with_label_values(&[service]).dec();
}
