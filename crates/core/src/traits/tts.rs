//! TTS + Response Cache capability contract (spec section 4.4).

use async_trait::async_trait;

use crate::error::Result;

/// Converts text to µ-law 8 kHz mono audio bytes (a whole number of 160
/// byte frames), consulting the Response Cache internally. Returns `None`
/// for empty/whitespace-only input without making an API call.
#[async_trait]
pub trait TtsAdapter: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Option<Vec<u8>>>;
}
