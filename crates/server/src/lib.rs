//! Control plane: HTTP routes, the telephony media socket, the observer
//! relay socket, shared process state, and metrics export.

pub mod error;
pub mod http;
pub mod metrics;
pub mod state;
#[cfg(test)]
mod test_support;
pub mod websocket;

pub use error::ServerError;
pub use http::create_router;
pub use metrics::install_recorder;
pub use state::AppState;
