//! Process-wide shared state: configuration, the active-session map, and
//! the four vendor adapters every new call is wired against (spec section
//! 5's "process-global, serialized" resources).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics_exporter_prometheus::PrometheusHandle;

use michael_agent::SessionHandle;
use michael_config::Settings;
use michael_core::session::SessionId;
use michael_core::traits::{AsrConnector, LlmAdapter, TelephonyAdapter, TtsAdapter};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub sessions: Arc<DashMap<SessionId, Arc<SessionHandle>>>,
    pub telephony: Arc<dyn TelephonyAdapter>,
    pub asr: Arc<dyn AsrConnector>,
    pub llm: Arc<dyn LlmAdapter>,
    pub tts: Arc<dyn TtsAdapter>,
    pub started_at: DateTime<Utc>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        config: Settings,
        telephony: Arc<dyn TelephonyAdapter>,
        asr: Arc<dyn AsrConnector>,
        llm: Arc<dyn LlmAdapter>,
        tts: Arc<dyn TtsAdapter>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            sessions: Arc::new(DashMap::new()),
            telephony,
            asr,
            llm,
            tts,
            started_at: Utc::now(),
            metrics_handle: None,
        }
    }

    pub fn with_metrics_handle(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Base URL other parties (the telephony carrier) should call back into
    /// this process on, preferring the operator-configured public hostname
    /// over the bind address (spec section 6, "optional explicit public
    /// hostnames").
    pub fn public_base_url(&self, request_host: &str) -> String {
        match &self.config.server.public_hostname {
            Some(host) if !host.is_empty() => host.clone(),
            _ => format!("https://{request_host}"),
        }
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }

    /// Bare host (no scheme) other parties should open the media/observer
    /// websockets against, preferring the operator-configured public
    /// hostname over the request's `Host` header (spec section 6).
    pub fn websocket_host(&self, request_host: &str) -> String {
        match &self.config.server.public_hostname {
            Some(host) if !host.is_empty() => host
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .to_string(),
            _ => request_host.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_state;

    #[test]
    fn public_base_url_prefers_configured_hostname() {
        let mut state = sample_state();
        Arc::get_mut(&mut state.config).unwrap().server.public_hostname =
            Some("https://calls.example.com".into());
        assert_eq!(state.public_base_url("127.0.0.1:8080"), "https://calls.example.com");
    }

    #[test]
    fn public_base_url_falls_back_to_request_host() {
        let state = sample_state();
        assert_eq!(state.public_base_url("127.0.0.1:8080"), "https://127.0.0.1:8080");
    }

    #[test]
    fn websocket_host_strips_scheme_from_configured_hostname() {
        let mut state = sample_state();
        Arc::get_mut(&mut state.config).unwrap().server.public_hostname =
            Some("https://calls.example.com".into());
        assert_eq!(state.websocket_host("127.0.0.1:8080"), "calls.example.com");
    }
}
