//! Media channel write side (spec section 4.2). Wraps the outbound half of
//! the telephony WebSocket the server crate accepts at
//! `/call/media/:sessionId`; frames and control messages are JSON envelopes
//! queued onto an `mpsc` channel the websocket task drains, so `send_frame`
//! never blocks on socket I/O directly.

use async_trait::async_trait;
use base64::Engine;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use michael_core::audio::{FRAME_MS, MAX_FRAMES_PER_BURST};
use michael_core::traits::MediaSink;
use michael_core::{CancelToken, Result};

use crate::error::TransportError;

/// The write side of one call's media WebSocket.
pub struct ChannelMediaSink {
    stream_sid: String,
    tx: mpsc::Sender<String>,
}

impl ChannelMediaSink {
    pub fn new(stream_sid: String, tx: mpsc::Sender<String>) -> Self {
        Self { stream_sid, tx }
    }
}

#[async_trait]
impl MediaSink for ChannelMediaSink {
    async fn send_frame(&self, payload_b64: &str) -> Result<()> {
        let envelope = serde_json::json!({
            "event": "media",
            "streamSid": self.stream_sid,
            "media": { "payload": payload_b64 },
        });
        self.tx
            .send(envelope.to_string())
            .await
            .map_err(|_| TransportError::ChannelClosed.into())
    }

    async fn clear_playback(&self) -> Result<()> {
        let envelope = serde_json::json!({ "event": "clear", "streamSid": self.stream_sid });
        self.tx
            .send(envelope.to_string())
            .await
            .map_err(|_| TransportError::ChannelClosed.into())
    }
}

/// Streams raw µ-law bytes as base64 20 ms frames, yielding for one frame
/// duration every [`MAX_FRAMES_PER_BURST`] frames so heartbeats on the same
/// channel are not starved (spec section 4.2, section 5 backpressure).
/// Stops early, returning `Ok(())`, if `cancel` fires (barge-in).
pub async fn stream_with_backpressure(
    sink: &dyn MediaSink,
    mulaw_frames: &[Vec<u8>],
    cancel: &CancelToken,
) -> Result<()> {
    for (i, frame) in mulaw_frames.iter().enumerate() {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let payload = base64::engine::general_purpose::STANDARD.encode(frame);
        sink.send_frame(&payload).await?;

        if (i + 1) % MAX_FRAMES_PER_BURST == 0 {
            sleep(Duration::from_millis(FRAME_MS)).await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use michael_core::audio::FRAME_BYTES;

    struct RecordingSink {
        sent: tokio::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MediaSink for RecordingSink {
        async fn send_frame(&self, payload_b64: &str) -> Result<()> {
            self.sent.lock().await.push(payload_b64.to_string());
            Ok(())
        }
        async fn clear_playback(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn stops_sending_once_cancelled() {
        let sink = RecordingSink { sent: tokio::sync::Mutex::new(Vec::new()) };
        let frames = vec![vec![0xFFu8; FRAME_BYTES]; 5];
        let cancel = CancelToken::new();
        cancel.cancel();

        stream_with_backpressure(&sink, &frames, &cancel).await.unwrap();
        assert!(sink.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn sends_every_frame_when_not_cancelled() {
        let sink = RecordingSink { sent: tokio::sync::Mutex::new(Vec::new()) };
        let frames = vec![vec![0xFFu8; FRAME_BYTES]; 3];
        let cancel = CancelToken::new();

        stream_with_backpressure(&sink, &frames, &cancel).await.unwrap();
        assert_eq!(sink.sent.lock().await.len(), 3);
    }
}
