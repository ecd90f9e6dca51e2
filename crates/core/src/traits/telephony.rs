//! Telephony capability contract (spec section 4.2).

use async_trait::async_trait;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct PlaceCallRequest {
    pub to: String,
    pub answer_url: String,
    pub status_url: String,
    pub amd_url: String,
    pub timeout_seconds: u32,
    pub async_amd: bool,
    pub machine_detection_mode: String,
}

#[derive(Debug, Clone)]
pub struct CallHandle {
    pub call_sid: String,
}

/// Places and controls outbound calls. One implementation per carrier.
#[async_trait]
pub trait TelephonyAdapter: Send + Sync {
    async fn place_call(&self, req: PlaceCallRequest) -> Result<CallHandle>;
    async fn hangup(&self, call_sid: &str) -> Result<()>;
}

/// The write side of an already-open bidirectional media channel for one
/// call. Implementations own the outbound socket; `send_frame` must not
/// block the caller beyond the backpressure contract in spec section 5.
#[async_trait]
pub trait MediaSink: Send + Sync {
    async fn send_frame(&self, payload_b64: &str) -> Result<()>;
    async fn clear_playback(&self) -> Result<()>;
}
