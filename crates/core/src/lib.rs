//! Core session data model, error taxonomy, and adapter capability
//! contracts shared by every other crate in the call engine.

pub mod audio;
pub mod cancel;
pub mod error;
pub mod session;
pub mod traits;

pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use session::{
    Bant, ConversationEntry, Counters, Flags, OperatorInput, Prospect, Role, Session, SessionId,
    SessionStatus, SentimentLabel, SentimentPoint, SentimentState, Tone, TranscriptEntry,
    new_session_id,
};
