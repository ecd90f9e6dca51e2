//! Single-shot chat-completion capability contract (spec section 4.5).

use async_trait::async_trait;

use crate::error::Result;
use crate::session::Role;

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Requests one completion over `system` instructions plus `history`.
    async fn complete(
        &self,
        system: &str,
        history: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String>;
}
