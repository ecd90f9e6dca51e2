//! Streaming ASR capability contract (spec section 4.3).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Turn-completion heuristic applied to a final ASR fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    Complete,
    MidThought,
    Ambiguous,
}

#[derive(Debug, Clone, Default)]
pub struct FinalMetadata {
    pub detected_language: Option<String>,
    pub confidence: Option<f32>,
    pub turn_status: Option<TurnStatus>,
}

#[derive(Debug, Clone)]
pub enum AsrEvent {
    Interim(String),
    Final { text: String, metadata: FinalMetadata },
    UtteranceEnd,
}

/// A live ASR connection for one call. Feeding stops being meaningful once
/// the underlying connection has been closed or has dropped.
#[async_trait]
pub trait AsrSession: Send + Sync {
    async fn send_audio(&self, frame_b64: &str) -> Result<()>;
    async fn close(&self) -> Result<()>;
}

/// Opens one streaming ASR connection per call, configured per spec
/// section 4.3 (µ-law 8 kHz mono, interim results, smart formatting,
/// endpointing, punctuation).
#[async_trait]
pub trait AsrConnector: Send + Sync {
    async fn connect(
        &self,
        session_id: &str,
    ) -> Result<(
        Box<dyn AsrSession>,
        tokio::sync::mpsc::Receiver<AsrEvent>,
    )>;
}
