//! Prometheus metrics installation and the `/metrics` scrape endpoint.
//! Series recorded elsewhere in the workspace (barge-ins, ASR reconnects,
//! TTS cache hits/misses in `michael-agent`/`michael-pipeline`) are exposed
//! here only by virtue of sharing the global recorder installed in
//! [`install_recorder`]; this module additionally maintains the gauges and
//! counters the server itself is in a position to observe.

use axum::extract::State;
use axum::http::StatusCode;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;

/// Installs the process-global Prometheus recorder. Must be called exactly
/// once, before any `metrics::counter!`/`gauge!` call anywhere in the
/// process.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install prometheus recorder")
}

pub fn record_call_initiated() {
    metrics::counter!("michael_calls_initiated_total").increment(1);
}

pub fn record_call_initiate_rejected(reason: &'static str) {
    metrics::counter!("michael_call_initiate_rejected_total", "reason" => reason).increment(1);
}

pub fn set_active_sessions(count: usize) {
    metrics::gauge!("michael_sessions_active").set(count as f64);
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    match &state.metrics_handle {
        Some(handle) => Ok(handle.render()),
        None => Err(StatusCode::NOT_FOUND),
    }
}
