//! Control Plane HTTP surface (spec section 4.1, wire bytes in section 6).

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use michael_agent::{spawn, OrchestratorDeps, SessionCommand};
use michael_core::session::{OperatorInput, Prospect, Session, SessionStatus, Tone};
use michael_core::traits::PlaceCallRequest;
use michael_pipeline::cache::WARM_PHRASES;

use crate::error::ServerError;
use crate::metrics::{metrics_handler, record_call_initiate_rejected, record_call_initiated, set_active_sessions};
use crate::state::AppState;
use crate::websocket::{media_socket, observer_socket};

pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.server.cors_origins, state.config.server.cors_enabled);

    let initiate = Router::new()
        .route("/call/initiate", post(initiate_call))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let open = Router::new()
        .route("/call/webhook/:session_id", post(call_webhook))
        .route("/call/status/:session_id", post(call_status))
        .route("/call/amd/:session_id", post(call_amd))
        .route("/call/session/:session_id", get(call_session))
        .route("/call/media/:session_id", get(media_socket))
        .route("/call/transcript/:session_id", get(observer_socket))
        .route("/health", get(health))
        .route("/", get(health))
        .route("/voice/preview", get(voice_preview))
        .route("/metrics", get(metrics_handler));

    initiate
        .merge(open)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Builds the CORS layer from operator-configured allowed origins. An
/// empty allow-list or a disabled flag falls back to a permissive
/// development default, logged so it is never silently surprising in
/// production.
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("cors disabled, allowing any origin");
        return CorsLayer::permissive();
    }
    if origins.is_empty() {
        tracing::warn!("no cors origins configured, defaulting to http://localhost:3000");
        return CorsLayer::new()
            .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers(Any)
            .allow_credentials(true);
    }

    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    if parsed.is_empty() {
        tracing::warn!("all configured cors origins were invalid, defaulting to http://localhost:3000");
        return CorsLayer::new()
            .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers(Any)
            .allow_credentials(true);
    }
    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(true)
}

/// Constant-time comparison for the shared bearer secret (spec section 4.1).
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

async fn auth_middleware(
    State(state): State<AppState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let expected = &state.config.server.bearer_secret;
    if expected.is_empty() {
        return Ok(next.run(req).await);
    }
    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match provided {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
            Ok(next.run(req).await)
        }
        _ => Err(ServerError::Unauthorized),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitiateRequest {
    first_name: String,
    last_name: Option<String>,
    phone: String,
    company: String,
    selling: String,
    tone: Option<String>,
    industry: Option<String>,
    target_role: Option<String>,
    #[serde(default)]
    value_props: Vec<String>,
    #[serde(default)]
    common_objections: Vec<String>,
    additional_context: Option<String>,
    email: Option<String>,
}

impl InitiateRequest {
    fn validate(&self) -> Result<(), ServerError> {
        if self.first_name.trim().is_empty() {
            return Err(ServerError::BadRequest("firstName is required".into()));
        }
        if self.phone.trim().is_empty() {
            return Err(ServerError::BadRequest("phone is required".into()));
        }
        if self.company.trim().is_empty() {
            return Err(ServerError::BadRequest("company is required".into()));
        }
        if self.selling.trim().is_empty() {
            return Err(ServerError::BadRequest("selling is required".into()));
        }
        Ok(())
    }
}

async fn initiate_call(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<InitiateRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ServerError> {
    if let Err(err) = payload.validate() {
        record_call_initiate_rejected("bad_request");
        return Err(err);
    }

    let prospect = Prospect {
        first_name: payload.first_name,
        last_name: payload.last_name,
        phone: payload.phone,
    };
    let operator = OperatorInput {
        company: payload.company,
        selling: payload.selling,
        tone: Tone::parse_or_default(payload.tone.as_deref()),
        industry: payload.industry,
        target_role: payload.target_role,
        value_props: payload.value_props,
        common_objections: payload.common_objections,
        additional_context: payload.additional_context,
        email: payload.email,
    };

    let mut session = Session::new(prospect, operator);
    let host = request_host(&headers);
    let base = format!("https://{}", state.websocket_host(&host));

    let place_request = PlaceCallRequest {
        to: session.prospect.phone.clone(),
        answer_url: format!("{base}/call/webhook/{}", session.id),
        status_url: format!("{base}/call/status/{}", session.id),
        amd_url: format!("{base}/call/amd/{}", session.id),
        timeout_seconds: state.config.telephony.call_timeout_seconds,
        async_amd: true,
        machine_detection_mode: "DetectMessageEnd".to_string(),
    };

    let call_handle = state
        .telephony
        .place_call(place_request)
        .await
        .map_err(|err| {
            record_call_initiate_rejected("upstream");
            ServerError::from(err)
        })?;

    session.call_sid = Some(call_handle.call_sid.clone());
    session.status = SessionStatus::Initiating;
    let session_id = session.id.clone();

    let deps = OrchestratorDeps {
        telephony: state.telephony.clone(),
        asr: state.asr.clone(),
        llm: state.llm.clone(),
        tts: state.tts.clone(),
    };
    let handle = spawn(session, deps);
    state.sessions.insert(session_id.clone(), Arc::new(handle));
    record_call_initiated();
    set_active_sessions(state.sessions.len());

    Ok((
        StatusCode::OK,
        Json(json!({
            "sessionId": session_id,
            "callSid": call_handle.call_sid,
            "status": "initiating",
        })),
    ))
}

fn request_host(headers: &HeaderMap) -> String {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost")
        .to_string()
}

/// Telephony answer webhook: returns the XML directive opening the
/// bidirectional media stream, or an error-and-hangup directive for an
/// unknown session (spec section 4.1).
async fn call_webhook(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let host = request_host(&headers);
    let ws_host = state.websocket_host(&host);

    let xml = if state.sessions.contains_key(&session_id) {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <Response>\n\
             \t<Connect><Stream url=\"wss://{ws_host}/call/media/{session_id}\"/></Connect>\n\
             \t<Pause length=\"3600\"/>\n\
             </Response>"
        )
    } else {
        tracing::warn!(session_id, "answer webhook for unknown session");
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <Response>\n\
         \t<Say>We're sorry, something went wrong with this call.</Say>\n\
         \t<Hangup/>\n\
         </Response>"
            .to_string()
    };

    ([(header::CONTENT_TYPE, "text/xml")], xml)
}

#[derive(Debug, Deserialize)]
struct StatusForm {
    #[serde(rename = "CallStatus")]
    call_status: String,
    #[serde(rename = "CallDuration")]
    call_duration: Option<String>,
}

/// Maps the carrier's status vocabulary onto [`SessionStatus`] (spec
/// section 4.1). Unrecognized values are treated as a non-terminal
/// ringing state rather than rejected outright, since new carrier status
/// strings should not break an in-progress call.
fn parse_call_status(raw: &str) -> SessionStatus {
    match raw.to_ascii_lowercase().as_str() {
        "queued" | "initiated" => SessionStatus::Initiating,
        "ringing" => SessionStatus::Ringing,
        "in-progress" | "answered" => SessionStatus::Connected,
        "completed" => SessionStatus::Completed,
        "busy" => SessionStatus::Busy,
        "no-answer" => SessionStatus::NoAnswer,
        "canceled" => SessionStatus::Canceled,
        "failed" => SessionStatus::Failed,
        other => {
            tracing::warn!(status = other, "unrecognized call status, treating as ringing");
            SessionStatus::Ringing
        }
    }
}

const SESSION_RETENTION: Duration = Duration::from_secs(300);

async fn call_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Form(form): Form<StatusForm>,
) -> StatusCode {
    let Some(handle) = state.sessions.get(&session_id).map(|h| h.clone()) else {
        tracing::warn!(session_id, "status callback for unknown session");
        return StatusCode::OK;
    };

    let status = parse_call_status(&form.call_status);
    let duration = form.call_duration.and_then(|d| d.parse::<u64>().ok());
    let _ = handle.commands.send(SessionCommand::Status { status, duration }).await;

    if status.is_terminal() {
        let sessions = state.sessions.clone();
        let id = session_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(SESSION_RETENTION).await;
            sessions.remove(&id);
            set_active_sessions(sessions.len());
        });
    }
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct AmdForm {
    #[serde(rename = "AnsweredBy")]
    answered_by: String,
}

async fn call_amd(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Form(form): Form<AmdForm>,
) -> StatusCode {
    let Some(handle) = state.sessions.get(&session_id).map(|h| h.clone()) else {
        tracing::warn!(session_id, "amd callback for unknown session");
        return StatusCode::OK;
    };
    let _ = handle.commands.send(SessionCommand::Amd { answered_by: form.answered_by }).await;
    StatusCode::OK
}

async fn call_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let handle = state
        .sessions
        .get(&session_id)
        .map(|h| h.clone())
        .ok_or_else(|| ServerError::NotFound(session_id.clone()))?;

    let snapshot = handle.snapshot.read().await.clone();
    let analytics = json!({
        "sentimentScore": snapshot.sentiment.score,
        "sentimentLabel": snapshot.sentiment.label(),
        "bantDepth": snapshot.counters.bant.depth(),
        "objectionCount": snapshot.counters.objection_count,
        "meetingBooked": snapshot.flags.meeting_booked,
    });

    Ok(Json(json!({
        "sessionId": snapshot.id,
        "status": snapshot.status,
        "transcript": snapshot.transcript,
        "messageCount": snapshot.conversation.len(),
        "analytics": analytics,
        "sentiment": { "score": snapshot.sentiment.score, "label": snapshot.sentiment.label() },
    })))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "uptimeSeconds": state.uptime_seconds(),
        "activeSessions": state.sessions.len(),
    }))
}

#[derive(Debug, Deserialize)]
struct PreviewQuery {
    index: Option<usize>,
}

async fn voice_preview(
    State(state): State<AppState>,
    Query(query): Query<PreviewQuery>,
) -> Result<Response, ServerError> {
    let index = query.index.unwrap_or(0) % WARM_PHRASES.len();
    let phrase = WARM_PHRASES[index];

    let audio = state.tts.synthesize(phrase).await.map_err(ServerError::from)?;
    match audio {
        Some(bytes) => Ok(([(header::CONTENT_TYPE, "audio/basic")], bytes).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_state;

    #[test]
    fn router_creation_succeeds() {
        let _ = create_router(sample_state());
    }

    #[test]
    fn constant_time_eq_matches_equal_secrets() {
        assert!(constant_time_eq(b"shared-secret", b"shared-secret"));
    }

    #[test]
    fn constant_time_eq_rejects_different_length() {
        assert!(!constant_time_eq(b"short", b"longer-secret"));
    }

    #[test]
    fn parse_call_status_maps_known_values() {
        assert_eq!(parse_call_status("completed"), SessionStatus::Completed);
        assert_eq!(parse_call_status("no-answer"), SessionStatus::NoAnswer);
        assert_eq!(parse_call_status("in-progress"), SessionStatus::Connected);
    }

    #[test]
    fn parse_call_status_defaults_unknown_to_ringing() {
        assert_eq!(parse_call_status("bogus"), SessionStatus::Ringing);
    }

    #[test]
    fn initiate_request_rejects_missing_required_fields() {
        let req = InitiateRequest {
            first_name: "".into(),
            last_name: None,
            phone: "+15551234567".into(),
            company: "Acme".into(),
            selling: "software".into(),
            tone: None,
            industry: None,
            target_role: None,
            value_props: vec![],
            common_objections: vec![],
            additional_context: None,
            email: None,
        };
        assert!(req.validate().is_err());
    }
}
