//! Format descriptor attached to every analysis request.
//!
//! Only mono, 16-bit signed little-endian PCM is supported.  The sample rate
//! is free but must be non-zero.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// FormatError
// ---------------------------------------------------------------------------

/// Reason an [`AudioFormat`] was rejected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormatError {
    #[error("sample rate must be greater than zero")]
    ZeroSampleRate,

    #[error("unsupported channel count {0} (only mono is supported)")]
    UnsupportedChannels(u16),

    #[error("unsupported bit depth {0} (only 16-bit PCM is supported)")]
    UnsupportedBitDepth(u16),
}

// ---------------------------------------------------------------------------
// AudioFormat
// ---------------------------------------------------------------------------

/// Immutable description of a raw PCM buffer.
///
/// ```rust
/// use live_meter::audio::AudioFormat;
///
/// let format = AudioFormat::mono16(16_000);
/// assert!(format.validate().is_ok());
/// assert_eq!(format.bytes_per_sample(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Samples per second (e.g. 16 000, 48 000).
    pub sample_rate: u32,
    /// Interleaved channel count.  Must be `1`.
    pub channels: u16,
    /// Bits per sample.  Must be `16`.
    pub bit_depth: u16,
}

impl AudioFormat {
    /// Mono 16-bit PCM at `sample_rate`.
    pub const fn mono16(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            bit_depth: 16,
        }
    }

    /// Check that the format is one the analysis engines can handle.
    pub fn validate(&self) -> Result<(), FormatError> {
        if self.sample_rate == 0 {
            return Err(FormatError::ZeroSampleRate);
        }
        if self.channels != 1 {
            return Err(FormatError::UnsupportedChannels(self.channels));
        }
        if self.bit_depth != 16 {
            return Err(FormatError::UnsupportedBitDepth(self.bit_depth));
        }
        Ok(())
    }

    /// Bytes occupied by one sample frame.
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bit_depth / 8) * usize::from(self.channels)
    }

    /// Nyquist frequency in Hz.
    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::mono16(16_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono16_is_valid() {
        assert_eq!(AudioFormat::mono16(48_000).validate(), Ok(()));
    }

    #[test]
    fn zero_sample_rate_rejected() {
        let format = AudioFormat::mono16(0);
        assert_eq!(format.validate(), Err(FormatError::ZeroSampleRate));
    }

    #[test]
    fn stereo_rejected() {
        let format = AudioFormat {
            channels: 2,
            ..AudioFormat::default()
        };
        assert_eq!(format.validate(), Err(FormatError::UnsupportedChannels(2)));
    }

    #[test]
    fn twenty_four_bit_rejected() {
        let format = AudioFormat {
            bit_depth: 24,
            ..AudioFormat::default()
        };
        assert_eq!(format.validate(), Err(FormatError::UnsupportedBitDepth(24)));
    }

    #[test]
    fn nyquist_is_half_rate() {
        assert_eq!(AudioFormat::mono16(16_000).nyquist(), 8_000.0);
    }
}
