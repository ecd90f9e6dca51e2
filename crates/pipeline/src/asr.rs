//! Streaming ASR vendor adapter (spec section 4.3): opens one websocket per
//! call configured for µ-law 8 kHz mono, interim results, smart formatting,
//! utterance-end at 1.2 s silence, endpointing at 400 ms, punctuation on.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::http::Request;
use tokio_tungstenite::tungstenite::Message;

use michael_core::traits::{AsrConnector, AsrEvent, AsrSession, FinalMetadata, TurnStatus};
use michael_core::{Error, Result};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct AsrSettings {
    pub api_key: String,
    pub endpoint: String,
    pub utterance_end_ms: u32,
    pub endpointing_ms: u32,
}

/// Connects one streaming ASR session per call over a websocket.
pub struct StreamingAsrConnector {
    settings: AsrSettings,
}

impl StreamingAsrConnector {
    pub fn new(settings: AsrSettings) -> Self {
        Self { settings }
    }

    fn connect_url(&self, session_id: &str) -> String {
        format!(
            "{}?encoding=mulaw&sample_rate=8000&channels=1&interim_results=true\
             &smart_format=true&utterance_end_ms={}&endpointing={}&punctuate=true\
             &filler_words=true&session={}",
            self.settings.endpoint,
            self.settings.utterance_end_ms,
            self.settings.endpointing_ms,
            session_id,
        )
    }
}

#[async_trait]
impl AsrConnector for StreamingAsrConnector {
    async fn connect(
        &self,
        session_id: &str,
    ) -> Result<(Box<dyn AsrSession>, mpsc::Receiver<AsrEvent>)> {
        let url = self.connect_url(session_id);
        let request = Request::builder()
            .uri(&url)
            .header("Authorization", format!("Token {}", self.settings.api_key))
            .header("Sec-WebSocket-Protocol", "asr")
            .body(())
            .map_err(|e| Error::Adapter(format!("invalid asr request: {e}")))?;

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| Error::Adapter(format!("asr connect failed: {e}")))?;
        let (write, mut read) = stream.split();

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let message = match message {
                    Ok(m) => m,
                    Err(err) => {
                        tracing::warn!(error = %err, "asr websocket read failed");
                        break;
                    }
                };
                let Message::Text(text) = message else {
                    continue;
                };
                let Some(event) = parse_vendor_message(&text) else {
                    continue;
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            tracing::debug!("asr read loop ended");
        });

        Ok((Box::new(VendorAsrSession { write: Mutex::new(write) }), rx))
    }
}

type WsWrite =
    futures::stream::SplitSink<tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>, Message>;

struct VendorAsrSession {
    write: Mutex<WsWrite>,
}

#[async_trait]
impl AsrSession for VendorAsrSession {
    async fn send_audio(&self, frame_b64: &str) -> Result<()> {
        let payload = serde_json::json!({ "audio": frame_b64 }).to_string();
        self.write
            .lock()
            .await
            .send(Message::Text(payload))
            .await
            .map_err(|e| Error::Adapter(format!("asr send failed: {e}")))
    }

    async fn close(&self) -> Result<()> {
        self.write
            .lock()
            .await
            .send(Message::Text(r#"{"type":"CloseStream"}"#.to_string()))
            .await
            .map_err(|e| Error::Adapter(format!("asr close failed: {e}")))
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum VendorMessage {
    #[serde(rename = "interim")]
    Interim { text: String },
    #[serde(rename = "final")]
    Final {
        text: String,
        #[serde(default)]
        detected_language: Option<String>,
        #[serde(default)]
        confidence: Option<f32>,
    },
    #[serde(rename = "utterance_end")]
    UtteranceEnd,
}

fn parse_vendor_message(text: &str) -> Option<AsrEvent> {
    let message: VendorMessage = serde_json::from_str(text).ok()?;
    Some(match message {
        VendorMessage::Interim { text } => AsrEvent::Interim(text),
        VendorMessage::Final { text, detected_language, confidence } => {
            let turn_status = Some(classify_turn_status(&text));
            AsrEvent::Final {
                text,
                metadata: FinalMetadata { detected_language, confidence, turn_status },
            }
        }
        VendorMessage::UtteranceEnd => AsrEvent::UtteranceEnd,
    })
}

const SHORT_AFFIRMATIVES: &[&str] = &["yeah", "sure", "bye", "what do you think"];
const CONJUNCTIONS_AND_HEDGES: &[&str] =
    &["and", "but", "so", "because", "i think", "you know", "like", "um", "uh"];
const CLIFFHANGERS: &[&str] = &["so yeah", "and then", "which means", "because i"];

/// Turn-status heuristic (spec section 4.3), applied to final fragments.
pub fn classify_turn_status(text: &str) -> TurnStatus {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();
    let word_count = trimmed.split_whitespace().count();

    let ends_with_sentence_punctuation =
        trimmed.ends_with('.') || trimmed.ends_with('?') || trimmed.ends_with('!');
    let ends_with_short_affirmative = SHORT_AFFIRMATIVES
        .iter()
        .any(|phrase| lower.ends_with(phrase));

    if ends_with_sentence_punctuation || ends_with_short_affirmative || word_count <= 3 {
        return TurnStatus::Complete;
    }

    let ends_with_conjunction_or_hedge = lower.ends_with(',')
        || CONJUNCTIONS_AND_HEDGES
            .iter()
            .any(|word| lower.ends_with(word));
    let ends_with_cliffhanger = CLIFFHANGERS.iter().any(|phrase| lower.ends_with(phrase));

    if ends_with_conjunction_or_hedge || ends_with_cliffhanger {
        return TurnStatus::MidThought;
    }

    TurnStatus::Ambiguous
}
