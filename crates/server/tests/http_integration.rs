//! End-to-end HTTP surface tests driven through the router itself via
//! `tower::ServiceExt::oneshot`, rather than only unit-testing the pure
//! helper functions inside `http.rs`.

use std::sync::Arc;

use async_trait::async_trait;
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tower::ServiceExt;

use axum::body::Body;
use axum::http::{Request, StatusCode};

use michael_config::Settings;
use michael_core::traits::{
    AsrConnector, AsrEvent, AsrSession, CallHandle, ChatMessage, LlmAdapter, PlaceCallRequest,
    TelephonyAdapter, TtsAdapter,
};
use michael_core::Result;
use michael_server::{create_router, AppState};

struct NullTelephony;
#[async_trait]
impl TelephonyAdapter for NullTelephony {
    async fn place_call(&self, _req: PlaceCallRequest) -> Result<CallHandle> {
        Ok(CallHandle { call_sid: "CA0".into() })
    }
    async fn hangup(&self, _call_sid: &str) -> Result<()> {
        Ok(())
    }
}

struct NoopAsrSession;
#[async_trait]
impl AsrSession for NoopAsrSession {
    async fn send_audio(&self, _payload_b64: &str) -> Result<()> {
        Ok(())
    }
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct NullAsr;
#[async_trait]
impl AsrConnector for NullAsr {
    async fn connect(&self, _session_id: &str) -> Result<(Box<dyn AsrSession>, mpsc::Receiver<AsrEvent>)> {
        Ok((Box::new(NoopAsrSession), mpsc::channel(1).1))
    }
}

struct NullLlm;
#[async_trait]
impl LlmAdapter for NullLlm {
    async fn complete(
        &self,
        _system: &str,
        _history: &[ChatMessage],
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String> {
        Ok("ok".into())
    }
}

struct NullTts;
#[async_trait]
impl TtsAdapter for NullTts {
    async fn synthesize(&self, _text: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

fn test_state(bearer_secret: &str) -> AppState {
    let mut settings = Settings::default();
    settings.server.bearer_secret = bearer_secret.to_string();
    AppState::new(
        settings,
        Arc::new(NullTelephony),
        Arc::new(NullAsr),
        Arc::new(NullLlm),
        Arc::new(NullTts),
    )
}

#[tokio::test]
async fn unauthenticated_initiate_is_rejected_once_a_bearer_secret_is_configured() {
    let app = create_router(test_state("shared-secret"));
    let body = serde_json::json!({
        "firstName": "Jamie",
        "phone": "+15551234567",
        "company": "Acme",
        "selling": "widgets",
    });
    let request = Request::builder()
        .method("POST")
        .uri("/call/initiate")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_session_lookup_returns_404() {
    let app = create_router(test_state(""));
    let request = Request::builder()
        .uri("/call/session/does-not-exist")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_check_reports_ok() {
    let app = create_router(test_state(""));
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}
