//! Capability-contract traits for the engine's four external collaborators:
//! telephony carrier, streaming ASR, single-shot LLM, and TTS. Spec section
//! 1 treats vendor SDKs as opaque; every concrete integration in
//! `michael-transport`, `michael-pipeline`, and `michael-llm` implements one
//! of these traits and nothing upstream of the trait boundary knows which
//! vendor it is talking to.

mod asr;
mod llm;
mod telephony;
mod tts;

pub use asr::{AsrConnector, AsrEvent, AsrSession, FinalMetadata, TurnStatus};
pub use llm::{ChatMessage, LlmAdapter};
pub use telephony::{CallHandle, MediaSink, PlaceCallRequest, TelephonyAdapter};
pub use tts::TtsAdapter;
