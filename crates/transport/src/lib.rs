//! Telephony vendor adapter (spec section 4.2): call placement/hangup over
//! REST, and the media channel write side with backpressure-aware framing.

pub mod error;
pub mod media;
pub mod rest;

pub use error::TransportError;
pub use media::{stream_with_backpressure, ChannelMediaSink};
pub use rest::{RestTelephonyAdapter, TelephonySettings};
