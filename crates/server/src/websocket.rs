//! Telephony media socket and observer relay (spec section 4.2, wire bytes
//! in section 6). Both handlers reject an unknown session with a plain
//! 404 before upgrading, since there is no directive to send over a
//! websocket once it is open. The observer socket additionally checks the
//! `Origin` header against the configured allow-list and opens with an
//! immediate session-state snapshot before relaying subsequent events.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc, Mutex};

use michael_agent::{ObserverEvent, SessionCommand, SessionHandle};
use michael_core::traits::MediaSink;
use michael_transport::media::ChannelMediaSink;

use crate::state::AppState;

const MEDIA_OUTBOUND_CAPACITY: usize = 250;

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum InboundMediaMessage {
    Connected,
    Start { start: StreamStart },
    Media { media: MediaPayload },
    Stop,
}

#[derive(Debug, Deserialize)]
struct StreamStart {
    #[serde(rename = "streamSid")]
    stream_sid: String,
}

#[derive(Debug, Deserialize)]
struct MediaPayload {
    payload: String,
}

pub async fn media_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(handle) = state.sessions.get(&session_id).map(|h| h.clone()) else {
        tracing::warn!(session_id, "media socket opened for unknown session");
        return StatusCode::NOT_FOUND.into_response();
    };
    ws.on_upgrade(move |socket| handle_media_socket(socket, handle))
}

async fn handle_media_socket(socket: WebSocket, handle: Arc<SessionHandle>) {
    let (ws_tx, mut ws_rx) = socket.split();
    let ws_tx = Arc::new(Mutex::new(ws_tx));
    let (out_tx, mut out_rx) = mpsc::channel::<String>(MEDIA_OUTBOUND_CAPACITY);

    let forward_tx = ws_tx.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(envelope) = out_rx.recv().await {
            if forward_tx.lock().await.send(Message::Text(envelope)).await.is_err() {
                break;
            }
        }
    });

    let mut stopped = false;
    while let Some(Ok(msg)) = ws_rx.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let parsed = match serde_json::from_str::<InboundMediaMessage>(&text) {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::debug!(session_id = %handle.session_id, "unrecognized media socket frame");
                continue;
            }
        };

        match parsed {
            InboundMediaMessage::Connected => {}
            InboundMediaMessage::Start { start } => {
                let sink: Arc<dyn MediaSink> =
                    Arc::new(ChannelMediaSink::new(start.stream_sid.clone(), out_tx.clone()));
                let _ = handle
                    .commands
                    .send(SessionCommand::MediaConnected { sink, stream_sid: start.stream_sid })
                    .await;
                let _ = handle.commands.send(SessionCommand::MediaStart).await;
            }
            InboundMediaMessage::Media { media } => {
                let _ = handle.commands.send(SessionCommand::MediaAudio(media.payload)).await;
            }
            InboundMediaMessage::Stop => {
                stopped = true;
                let _ = handle.commands.send(SessionCommand::MediaStop).await;
                break;
            }
        }
    }

    if !stopped {
        let _ = handle.commands.send(SessionCommand::MediaStop).await;
    }
    forwarder.abort();
}

/// Checks the `Origin` header against the configured allow-list. An empty
/// allow-list means "allow any" (development only, per spec section 4); a
/// non-empty list rejects a missing or unrecognized `Origin`.
fn origin_allowed(headers: &HeaderMap, allow_list: &[String]) -> bool {
    if allow_list.is_empty() {
        return true;
    }
    let Some(origin) = headers.get(axum::http::header::ORIGIN).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    allow_list.iter().any(|allowed| allowed == origin)
}

pub async fn observer_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !origin_allowed(&headers, &state.config.server.observer_origins) {
        tracing::warn!(session_id, "observer socket rejected for disallowed origin");
        return StatusCode::FORBIDDEN.into_response();
    }
    let Some(handle) = state.sessions.get(&session_id).map(|h| h.clone()) else {
        tracing::warn!(session_id, "observer socket opened for unknown session");
        return StatusCode::NOT_FOUND.into_response();
    };
    ws.on_upgrade(move |socket| handle_observer_socket(socket, handle))
}

async fn handle_observer_socket(socket: WebSocket, handle: Arc<SessionHandle>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut events = handle.events.subscribe();

    {
        let snapshot = handle.snapshot.read().await;
        let initial = ObserverEvent::SessionState {
            status: snapshot.status,
            transcript: snapshot.transcript.clone(),
            message_count: snapshot.conversation.len(),
        };
        drop(snapshot);
        if let Ok(json) = serde_json::to_string(&initial) {
            if ws_tx.send(Message::Text(json)).await.is_err() {
                return;
            }
        }
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let Ok(json) = serde_json::to_string(&event) else { continue };
                        if ws_tx.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(session_id = %handle.session_id, missed, "observer socket lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }
}
