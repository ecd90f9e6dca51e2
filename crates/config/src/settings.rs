//! Main settings module.
//!
//! Priority (highest to lowest): environment variables (`MICHAEL__SECTION__FIELD`),
//! `config/{env}.yaml`, `config/default.yaml`, struct defaults.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telephony: TelephonyConfig,
    #[serde(default)]
    pub asr: AsrConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_cache()?;
        self.validate_secrets()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".into(),
                message: "port cannot be 0".into(),
            });
        }
        Ok(())
    }

    fn validate_cache(&self) -> Result<(), ConfigError> {
        if self.cache.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.capacity".into(),
                message: "capacity must be at least 1".into(),
            });
        }
        if self.cache.max_text_len == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.max_text_len".into(),
                message: "max_text_len must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// In production/staging, the vendor secrets and the shared bearer
    /// secret must be configured; in development they may be empty so the
    /// server can boot with adapters stubbed out for local testing.
    fn validate_secrets(&self) -> Result<(), ConfigError> {
        if !self.environment.is_strict() {
            return Ok(());
        }
        let required = [
            ("server.bearer_secret", &self.server.bearer_secret),
            ("telephony.account_sid", &self.telephony.account_sid),
            ("telephony.auth_token", &self.telephony.auth_token),
            ("telephony.from_number", &self.telephony.from_number),
            ("asr.api_key", &self.asr.api_key),
            ("llm.api_key", &self.llm.api_key),
            ("tts.api_key", &self.tts.api_key),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, v)| v.is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "secrets".into(),
                message: format!("missing required values in {:?} mode: {}", self.environment, missing.join(", ")),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Explicit public hostname used to stamp webhook/media-stream URLs
    /// when the process is not reachable at its bind address directly.
    #[serde(default)]
    pub public_hostname: Option<String>,
    /// Shared bearer secret, compared in constant time against the
    /// `Authorization` header on every state-changing request.
    #[serde(default)]
    pub bearer_secret: String,
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Origins permitted to open an observer WebSocket; empty means "allow
    /// any" (development only — see SPEC_FULL section 4).
    #[serde(default)]
    pub observer_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_hostname: None,
            bearer_secret: String::new(),
            cors_enabled: default_true(),
            cors_origins: Vec::new(),
            observer_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelephonyConfig {
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub from_number: String,
    #[serde(default = "default_telephony_base_url")]
    pub base_url: String,
    #[serde(default = "default_call_timeout_seconds")]
    pub call_timeout_seconds: u32,
}

fn default_telephony_base_url() -> String {
    "https://api.telephony.example.com/2010-04-01".to_string()
}
fn default_call_timeout_seconds() -> u32 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_asr_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_utterance_end_ms")]
    pub utterance_end_ms: u32,
    #[serde(default = "default_endpointing_ms")]
    pub endpointing_ms: u32,
}

fn default_asr_endpoint() -> String {
    "wss://asr.example.com/v1/listen".to_string()
}
fn default_utterance_end_ms() -> u32 {
    1200
}
fn default_endpointing_ms() -> u32 {
    400
}

impl Default for AsrConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_asr_endpoint(),
            utterance_end_ms: default_utterance_end_ms(),
            endpointing_ms: default_endpointing_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_llm_endpoint() -> String {
    "https://llm.example.com/v1/chat/completions".to_string()
}
fn default_llm_model() -> String {
    "default-chat-model".to_string()
}
fn default_temperature() -> f32 {
    0.85
}
fn default_max_tokens() -> u32 {
    200
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_tts_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
    #[serde(default = "default_tts_model")]
    pub model: String,
}

fn default_tts_endpoint() -> String {
    "https://tts.example.com/v1/text-to-speech".to_string()
}
fn default_voice_id() -> String {
    "default-voice".to_string()
}
fn default_tts_model() -> String {
    "low-latency".to_string()
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_tts_endpoint(),
            voice_id: default_voice_id(),
            model: default_tts_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,
}

fn default_cache_capacity() -> usize {
    50
}
fn default_cache_ttl_seconds() -> u64 {
    3600
}
fn default_max_text_len() -> usize {
    100
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_seconds: default_cache_ttl_seconds(),
            max_text_len: default_max_text_len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Loads settings from files and environment, validating before returning.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));
    if let Some(env_name) = env {
        builder = builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }
    builder = builder.add_source(
        Environment::with_prefix("MICHAEL")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_in_development() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.cache.capacity, 50);
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut settings = Settings::default();
        settings.server.port = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn production_requires_secrets() {
        let mut settings = Settings::default();
        settings.environment = RuntimeEnvironment::Production;
        assert!(settings.validate().is_err());

        settings.server.bearer_secret = "s".into();
        settings.telephony.account_sid = "a".into();
        settings.telephony.auth_token = "t".into();
        settings.telephony.from_number = "+15550000000".into();
        settings.asr.api_key = "k".into();
        settings.llm.api_key = "k".into();
        settings.tts.api_key = "k".into();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn cache_capacity_must_be_nonzero() {
        let mut settings = Settings::default();
        settings.cache.capacity = 0;
        assert!(settings.validate().is_err());
    }
}
