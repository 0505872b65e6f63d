//! Observability Metrics
//!
//! Prometheus metrics endpoint for monitoring.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

use please_hold_core::CallOutcome;

/// Global Prometheus handle
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize metrics recorder
///
/// Must be called once at startup before recording any metrics.
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_default_metrics();

    METRICS_HANDLE.get_or_init(|| handle.clone());
    handle
}

/// Get the global metrics handle
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Register default application metrics
fn register_default_metrics() {
    gauge!("please_hold_calls_active").set(0.0);
    counter!("please_hold_calls_started_total").absolute(0);

    // Pre-register one series per terminal outcome so fault rate is
    // graphable from zero.
    for outcome in [
        CallOutcome::CallerHangup,
        CallOutcome::MaxTurns,
        CallOutcome::SilenceTimeout,
        CallOutcome::Error,
    ] {
        counter!("please_hold_calls_ended_total", "outcome" => outcome.as_str()).absolute(0);
    }
}

/// Record a new call answered
pub fn record_call_started() {
    counter!("please_hold_calls_started_total").increment(1);
}

/// Record a call reaching a terminal outcome
pub fn record_call_ended(outcome: CallOutcome) {
    counter!("please_hold_calls_ended_total", "outcome" => outcome.as_str()).increment(1);
}

/// Record the active-calls gauge
pub fn record_active_calls(count: usize) {
    gauge!("please_hold_calls_active").set(count as f64);
}

/// Prometheus scrape endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    match get_metrics_handle() {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}
