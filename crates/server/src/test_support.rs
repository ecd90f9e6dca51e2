//! Null vendor adapters shared by this crate's `#[cfg(test)]` modules.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use michael_config::Settings;
use michael_core::traits::{
    AsrConnector, AsrEvent, AsrSession, CallHandle, ChatMessage, LlmAdapter, PlaceCallRequest,
    TelephonyAdapter, TtsAdapter,
};
use michael_core::Result;

use crate::state::AppState;

pub struct NullTelephony;
#[async_trait]
impl TelephonyAdapter for NullTelephony {
    async fn place_call(&self, _req: PlaceCallRequest) -> Result<CallHandle> {
        Ok(CallHandle { call_sid: "CA0".into() })
    }
    async fn hangup(&self, _call_sid: &str) -> Result<()> {
        Ok(())
    }
}

pub struct NullAsr;
#[async_trait]
impl AsrConnector for NullAsr {
    async fn connect(
        &self,
        _session_id: &str,
    ) -> Result<(Box<dyn AsrSession>, mpsc::Receiver<AsrEvent>)> {
        let (_tx, rx) = mpsc::channel(1);
        struct NoopSession;
        #[async_trait]
        impl AsrSession for NoopSession {
            async fn send_audio(&self, _frame_b64: &str) -> Result<()> {
                Ok(())
            }
            async fn close(&self) -> Result<()> {
                Ok(())
            }
        }
        Ok((Box::new(NoopSession), rx))
    }
}

pub struct NullLlm;
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

pub struct NullTts;
#[async_trait]
impl TtsAdapter for NullTts {
    async fn synthesize(&self, _text: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

pub fn sample_state() -> AppState {
    AppState::new(
        Settings::default(),
        Arc::new(NullTelephony),
        Arc::new(NullAsr),
        Arc::new(NullLlm),
        Arc::new(NullTts),
    )
}
