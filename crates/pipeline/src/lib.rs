//! Audio codec, process-global response cache, and streaming ASR / TTS
//! vendor adapters (spec sections 4.3 and 4.4).

pub mod asr;
pub mod cache;
pub mod codec;
pub mod error;
pub mod tts;

pub use asr::{classify_turn_status, AsrSettings, StreamingAsrConnector};
pub use cache::ResponseCache;
pub use codec::into_frames;
pub use error::PipelineError;
pub use tts::{TtsSettings, VendorTtsAdapter};
