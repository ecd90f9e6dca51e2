//! µ-law 8 kHz mono audio codec (spec section 4.4, 4.2).
//!
//! Telephony wire audio is G.711 µ-law; vendor TTS APIs return a compressed
//! format (mp3/opus) at their own sample rate. `transcode_to_mulaw` shells
//! out to `ffmpeg` for the format conversion and resample, matching the
//! "child-process invocation for audio transcoding" suspension point in
//! spec section 5 — running it inline would block the executor far beyond
//! one scheduling quantum.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use michael_core::audio::FRAME_BYTES;

use crate::error::{PipelineError, Result};

const TRANSCODE_TIMEOUT: Duration = Duration::from_secs(10);

static MULAW_ENCODE_TABLE: once_cell::sync::Lazy<[u8; 8192]> =
    once_cell::sync::Lazy::new(build_encode_table);

const BIAS: i32 = 0x84;
const CLIP: i32 = 32635;

fn build_encode_table() -> [u8; 8192] {
    let mut table = [0u8; 8192];
    for (pcm, slot) in table.iter_mut().enumerate() {
        // table indexes the absolute value of a 14-bit-shifted sample.
        let sample = (pcm as i32) << 2;
        *slot = encode_sample(sample);
    }
    table
}

fn encode_sample(sample: i32) -> u8 {
    let sign: i32 = if sample < 0 { 0x80 } else { 0x00 };
    let mut magnitude = sample.abs().min(CLIP) + BIAS;

    let mut exponent = 7;
    for exp in (0..8).rev() {
        if magnitude & (0x4000 >> (7 - exp)) != 0 {
            exponent = exp;
            break;
        }
    }
    let mantissa = (magnitude >> (exponent + 3)) & 0x0F;
    magnitude = mantissa;
    !(sign as u8 | ((exponent as u8) << 4) | magnitude as u8)
}

/// Encodes linear 16-bit PCM samples (little-endian byte pairs) to µ-law.
pub fn pcm16_to_mulaw(pcm: &[i16]) -> Vec<u8> {
    pcm.iter()
        .map(|&sample| {
            let idx = (sample as i32).unsigned_abs().min(CLIP as u32) as usize >> 2;
            let sign = if sample < 0 { 0x80u8 } else { 0 };
            // The table is built from magnitudes only (`build_encode_table`
            // always feeds `encode_sample` a non-negative sample), so it
            // already encodes the sign=0 byte; only the actual negative
            // samples need their sign bit flipped in on top of that.
            MULAW_ENCODE_TABLE[idx.min(8191)] ^ sign
        })
        .collect()
}

const MULAW_DECODE_TABLE: [i16; 256] = build_decode_table();

const fn build_decode_table() -> [i16; 256] {
    let mut table = [0i16; 256];
    let mut i = 0;
    while i < 256 {
        let byte = !(i as u8);
        let sign = byte & 0x80;
        let exponent = (byte >> 4) & 0x07;
        let mantissa = byte & 0x0F;
        let mut sample = ((mantissa as i32) << 3) + BIAS;
        sample <<= exponent as i32;
        sample -= BIAS;
        table[i] = if sign != 0 { -(sample as i16) } else { sample as i16 };
        i += 1;
    }
    table
}

/// Decodes µ-law bytes to linear 16-bit PCM.
pub fn mulaw_to_pcm16(mulaw: &[u8]) -> Vec<i16> {
    mulaw.iter().map(|&b| MULAW_DECODE_TABLE[b as usize]).collect()
}

/// Naive linear resampler. Adequate for the short acknowledgement phrases
/// and call utterances this engine synthesizes; a production pipeline with
/// music-grade audio would reach for `rubato` instead.
pub fn resample_linear(samples: &[i16], from_hz: u32, to_hz: u32) -> Vec<i16> {
    if from_hz == to_hz || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = to_hz as f64 / from_hz as f64;
    let out_len = ((samples.len() as f64) * ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos.floor() as usize;
        let frac = src_pos - idx as f64;
        let a = samples.get(idx).copied().unwrap_or(0) as f64;
        let b = samples.get(idx + 1).copied().unwrap_or(a as i16) as f64;
        out.push((a + (b - a) * frac).round() as i16);
    }
    out
}

/// Splits µ-law bytes into 160-byte (20 ms) wire frames. A trailing partial
/// frame is zero-padded rather than dropped so playback duration estimates
/// stay accurate.
pub fn into_frames(mulaw: &[u8]) -> Vec<Vec<u8>> {
    let mut frames: Vec<Vec<u8>> = mulaw.chunks(FRAME_BYTES).map(|c| c.to_vec()).collect();
    if let Some(last) = frames.last_mut() {
        if last.len() < FRAME_BYTES {
            last.resize(FRAME_BYTES, 0xFF);
        }
    }
    frames
}

/// Converts vendor-compressed TTS audio (mp3/opus, at `source_hz`) to raw
/// µ-law bytes at 8 kHz mono via `ffmpeg`, bounded by a 10 s timeout.
pub async fn transcode_to_mulaw(compressed: &[u8], source_format: &str) -> Result<Vec<u8>> {
    let fut = run_ffmpeg(compressed, source_format);
    match tokio::time::timeout(TRANSCODE_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(PipelineError::TranscodeTimeout(TRANSCODE_TIMEOUT)),
    }
}

async fn run_ffmpeg(compressed: &[u8], source_format: &str) -> Result<Vec<u8>> {
    let mut child = Command::new("ffmpeg")
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            source_format,
            "-i",
            "pipe:0",
            "-ar",
            "8000",
            "-ac",
            "1",
            "-f",
            "mulaw",
            "pipe:1",
        ])
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| PipelineError::Transcode(format!("failed to spawn ffmpeg: {e}")))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| PipelineError::Transcode("ffmpeg stdin unavailable".into()))?;
    let input = compressed.to_vec();
    let write_task = tokio::spawn(async move {
        let _ = stdin.write_all(&input).await;
        let _ = stdin.shutdown().await;
    });

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| PipelineError::Transcode(format!("ffmpeg exited abnormally: {e}")))?;
    let _ = write_task.await;

    if !output.status.success() {
        return Err(PipelineError::Transcode(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mulaw_round_trip_is_lossy_but_close() {
        let pcm: Vec<i16> = vec![0, 1000, -1000, 16000, -16000, 32000, -32000];
        let encoded = pcm16_to_mulaw(&pcm);
        let decoded = mulaw_to_pcm16(&encoded);
        for (orig, rt) in pcm.iter().zip(decoded.iter()) {
            assert!((*orig as i32 - *rt as i32).abs() < 700, "{orig} vs {rt}");
        }
    }

    #[test]
    fn mulaw_byte_round_trip_is_exact_for_every_byte_value() {
        for b in 0u16..=255 {
            let byte = b as u8;
            let pcm = mulaw_to_pcm16(&[byte]);
            let re_encoded = pcm16_to_mulaw(&pcm);
            assert_eq!(re_encoded[0], byte, "byte {byte:#04x} failed round trip");
        }
    }

    #[test]
    fn silence_encodes_to_a_stable_byte() {
        let pcm = vec![0i16; 160];
        let encoded = pcm16_to_mulaw(&pcm);
        assert!(encoded.iter().all(|&b| b == encoded[0]));
    }

    #[test]
    fn resample_identity_is_a_no_op() {
        let samples = vec![1, 2, 3, 4, 5];
        assert_eq!(resample_linear(&samples, 8000, 8000), samples);
    }

    #[test]
    fn resample_downsamples_to_expected_length() {
        let samples = vec![0i16; 1600]; // 100ms at 16kHz
        let out = resample_linear(&samples, 16000, 8000);
        assert_eq!(out.len(), 800); // 100ms at 8kHz
    }

    #[test]
    fn frames_are_padded_to_160_bytes() {
        let bytes = vec![0xAAu8; 250];
        let frames = into_frames(&bytes);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].len(), FRAME_BYTES);
        assert_eq!(frames[1].len(), FRAME_BYTES);
    }
}
