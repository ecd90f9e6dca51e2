//! Error types shared by every crate that touches session state or
//! implements one of the adapter traits in [`crate::traits`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("session {0} is terminal and rejects new media events")]
    Terminal(String),

    #[error("duplicate media-start event ignored for session {0}")]
    DuplicateStart(String),

    #[error("a generation is already in flight for session {0}")]
    GenerationInFlight(String),

    #[error("opening cooldown already cleared for session {0}")]
    CooldownAlreadyCleared(String),

    #[error("unknown session {0}")]
    NotFound(String),

    /// A concrete adapter (telephony, ASR, LLM, TTS) failed at its vendor
    /// boundary. Adapters carry richer error types internally and collapse
    /// them to a message here, matching the "capability contract" framing
    /// of spec section 1 — callers above the adapter only need to know
    /// that the collaborator failed, not its wire-level cause.
    #[error("adapter error: {0}")]
    Adapter(String),
}

pub type Result<T> = std::result::Result<T, Error>;
