//! Single-shot chat-completion vendor adapter (spec section 4.5).

pub mod client;
pub mod error;

pub use client::{LlmSettings, VendorLlmAdapter};
pub use error::LlmError;
