//! µ-law 8 kHz mono wire-format constants.
//!
//! The Audio Codec lives in `michael-pipeline`; these constants are shared
//! by any crate that needs to reason about frame sizing without pulling in
//! the codec itself (e.g. the transport crate's backpressure logic).

/// One 20 ms frame at 8 kHz, 8-bit µ-law: 160 samples == 160 bytes.
pub const FRAME_BYTES: usize = 160;

/// Frame duration in milliseconds.
pub const FRAME_MS: u64 = 20;

/// Telephony sample rate in Hz.
pub const SAMPLE_RATE_HZ: u32 = 8_000;

/// Maximum frames sent between cooperative yields (~1 second of audio).
pub const MAX_FRAMES_PER_BURST: usize = 50;
