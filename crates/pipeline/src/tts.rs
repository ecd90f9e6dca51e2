//! TTS vendor adapter + Response Cache (spec section 4.4).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use michael_core::traits::TtsAdapter;
use michael_core::{Error, Result};

use crate::cache::{ResponseCache, WARM_PHRASES};
use crate::codec;

#[derive(Debug, Clone)]
pub struct TtsSettings {
    pub api_key: String,
    pub endpoint: String,
    pub voice_id: String,
    pub model: String,
    pub request_timeout: Duration,
}

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    voice_id: &'a str,
    model_id: &'a str,
}

/// Vendor TTS backed by the process-global [`ResponseCache`].
pub struct VendorTtsAdapter {
    settings: TtsSettings,
    client: reqwest::Client,
    cache: Arc<ResponseCache>,
}

impl VendorTtsAdapter {
    pub fn new(settings: TtsSettings, cache: Arc<ResponseCache>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| Error::Adapter(format!("failed to build tts http client: {e}")))?;
        Ok(Self { settings, client, cache })
    }

    /// Best-effort background cache warm with the fixed acknowledgement
    /// phrase list. Failures are logged, never propagated.
    pub async fn warm(&self) {
        for phrase in WARM_PHRASES {
            match self.synthesize(phrase).await {
                Ok(Some(_)) => tracing::debug!(phrase, "tts cache warmed"),
                Ok(None) => {}
                Err(err) => tracing::warn!(phrase, error = %err, "tts cache warm failed"),
            }
        }
    }

    async fn call_vendor(&self, text: &str) -> Result<Vec<u8>> {
        let url = format!("{}/v1/text-to-speech/{}", self.settings.endpoint, self.settings.voice_id);
        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.settings.api_key)
            .json(&SynthesizeRequest {
                text,
                voice_id: &self.settings.voice_id,
                model_id: &self.settings.model,
            })
            .send()
            .await
            .map_err(|e| Error::Adapter(format!("tts request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Adapter(format!(
                "tts vendor returned {}",
                response.status()
            )));
        }
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::Adapter(format!("failed reading tts response body: {e}")))
    }
}

#[async_trait]
impl TtsAdapter for VendorTtsAdapter {
    async fn synthesize(&self, text: &str) -> Result<Option<Vec<u8>>> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let key = ResponseCache::normalize(text);
        if let Some(cached) = self.cache.get(&key) {
            metrics::counter!("michael_tts_cache_hits_total").increment(1);
            return Ok(Some((*cached).clone()));
        }
        metrics::counter!("michael_tts_cache_misses_total").increment(1);

        let compressed = self.call_vendor(text).await?;
        let mulaw = codec::transcode_to_mulaw(&compressed, "mp3")
            .await
            .map_err(Error::from)?;

        self.cache.put(key, mulaw.clone());
        Ok(Some(mulaw))
    }
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct VendorErrorBody {
    detail: Option<String>,
}
