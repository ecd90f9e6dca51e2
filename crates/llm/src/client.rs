//! Single-shot chat-completion adapter (spec section 4.5): one request per
//! orchestrator turn over `system` instructions plus the session history,
//! no streaming and no tool calling — the orchestrator always wants the
//! whole utterance before handing it to TTS.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use michael_core::traits::{ChatMessage, LlmAdapter};
use michael_core::session::Role;
use michael_core::Result;

use crate::error::LlmError;

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub request_timeout: Duration,
}

pub struct VendorLlmAdapter {
    settings: LlmSettings,
    client: reqwest::Client,
}

impl VendorLlmAdapter {
    pub fn new(settings: LlmSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(LlmError::from)?;
        Ok(Self { settings, client })
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::Assistant => "assistant",
        Role::User => "user",
    }
}

#[async_trait]
impl LlmAdapter for VendorLlmAdapter {
    async fn complete(
        &self,
        system: &str,
        history: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(WireMessage { role: "system", content: system });
        for turn in history {
            messages.push(WireMessage { role: role_name(turn.role), content: &turn.text });
        }

        let request = CompletionRequest {
            model: &self.settings.model,
            messages,
            temperature,
            max_tokens,
        };

        let response = self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(LlmError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Vendor { status: status.as_u16(), body }.into());
        }

        let body: CompletionResponse = response.json().await.map_err(LlmError::from)?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyCompletion.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_system_then_history_in_order() {
        let history = vec![
            ChatMessage { role: Role::User, text: "hi".into() },
            ChatMessage { role: Role::Assistant, text: "hello".into() },
        ];
        let mut messages = vec![WireMessage { role: "system", content: "be concise" }];
        for turn in &history {
            messages.push(WireMessage { role: role_name(turn.role), content: &turn.text });
        }
        let request = CompletionRequest { model: "default-chat-model", messages, temperature: 0.85, max_tokens: 200 };

        let json = serde_json::to_string(&request).unwrap();
        let system_pos = json.find("be concise").unwrap();
        let hi_pos = json.find("\"hi\"").unwrap();
        let hello_pos = json.find("hello").unwrap();
        assert!(system_pos < hi_pos);
        assert!(hi_pos < hello_pos);
    }

    #[test]
    fn empty_choices_parses_as_error_response() {
        let json = r#"{"choices": []}"#;
        let response: CompletionResponse = serde_json::from_str(json).unwrap();
        assert!(response.choices.is_empty());
    }
}
