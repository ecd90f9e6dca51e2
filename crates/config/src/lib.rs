//! Layered settings loader for the call engine: `config/default.yaml`,
//! an optional per-environment overlay, then `MICHAEL__SECTION__FIELD`
//! environment variables, in that priority order.

pub mod error;
pub mod settings;

pub use error::ConfigError;
pub use settings::{
    AsrConfig, CacheConfig, LlmConfig, ObservabilityConfig, RuntimeEnvironment, ServerConfig,
    Settings, TelephonyConfig, TtsConfig, load_settings,
};
