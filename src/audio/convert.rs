//! Conversion between raw 16-bit PCM bytes and normalised `f32` samples.
//!
//! Decoding divides each little-endian `i16` by `32768.0`, so every decoded
//! sample lies in `[-1.0, 1.0)`.  Encoding clamps to `[-1.0, 1.0]`, scales by
//! `32768.0` and saturates at the `i16` range, so a decode → encode cycle
//! reproduces the original bytes exactly and out-of-range floats never wrap.
//!
//! # Example
//!
//! ```rust
//! use live_meter::audio::{float_to_pcm16, pcm16_to_float};
//!
//! let pcm: Vec<u8> = [0i16, 16_384, -32_768, 32_767]
//!     .iter()
//!     .flat_map(|s| s.to_le_bytes())
//!     .collect();
//!
//! let samples = pcm16_to_float(&pcm);
//! assert_eq!(samples, vec![0.0, 0.5, -1.0, 32_767.0 / 32_768.0]);
//! assert_eq!(float_to_pcm16(&samples), pcm);
//! ```

use thiserror::Error;

const SCALE: f32 = 32_768.0;

/// Error from the strict decoder.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConversionError {
    #[error("PCM16 buffer has odd length {len}; trailing byte cannot form a sample")]
    OddLength { len: usize },
}

/// Decode little-endian signed 16-bit PCM into `f32` samples.
///
/// A trailing odd byte cannot form a sample and is dropped.  This is logged
/// at `warn` level because it usually means the capture layer split a chunk
/// mid-sample.  Use [`try_pcm16_to_float`] to reject such buffers instead.
pub fn pcm16_to_float(buffer: &[u8]) -> Vec<f32> {
    if buffer.len() % 2 != 0 {
        log::warn!(
            "pcm16_to_float: dropping trailing byte of odd-length buffer ({} bytes)",
            buffer.len()
        );
    }

    buffer
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / SCALE)
        .collect()
}

/// Like [`pcm16_to_float`] but fails on odd-length input.
pub fn try_pcm16_to_float(buffer: &[u8]) -> Result<Vec<f32>, ConversionError> {
    if buffer.len() % 2 != 0 {
        return Err(ConversionError::OddLength { len: buffer.len() });
    }
    Ok(pcm16_to_float(buffer))
}

/// Encode `f32` samples as little-endian signed 16-bit PCM.
///
/// Samples are clamped to `[-1.0, 1.0]` first; `+1.0` saturates to `32767`.
pub fn float_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let scaled = (sample.clamp(-1.0, 1.0) * SCALE).round();
        let value = scaled.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}
