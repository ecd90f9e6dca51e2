//! Prompt building, intent/sentiment detection, observer-stream events, and
//! the per-call session orchestrator (spec sections 4.5 through 4.7).

pub mod detectors;
pub mod events;
pub mod orchestrator;
pub mod prompt;

pub use events::ObserverEvent;
pub use orchestrator::{spawn, OrchestratorDeps, SessionCommand, SessionHandle};
