//! Optional DC-offset removal and peak normalisation of a PCM chunk.
//!
//! Steps, in order:
//!
//! 1. Decode to `f32` and measure the DC offset.
//! 2. Subtract the offset when removal is requested and
//!    `|offset| > DC_OFFSET_EPSILON`.
//! 3. Detect clipping on the (possibly DC-corrected) signal.  This happens
//!    before any gain so it reflects what was captured.
//! 4. Scale to [`NORMALIZE_TARGET`] peak when normalisation is requested.
//! 5. Measure RMS/peak on the final signal and re-encode to PCM16.

use super::convert::{float_to_pcm16, pcm16_to_float};
use super::metrics::{dc_offset, has_clipping, peak, rms, CLIPPING_THRESHOLD};

/// Offsets at or below this magnitude are left alone.
pub const DC_OFFSET_EPSILON: f32 = 0.001;

/// Peak level after normalisation (5% headroom).
pub const NORMALIZE_TARGET: f32 = 0.95;

/// What to do to the chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessOptions {
    pub normalize: bool,
    pub remove_dc_offset: bool,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            normalize: false,
            remove_dc_offset: true,
        }
    }
}

/// Processed chunk plus its levels.
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessed {
    /// Re-encoded PCM16 samples.  Owned by the caller.
    pub data: Vec<u8>,
    /// RMS of the processed signal.
    pub rms: f32,
    /// Peak of the processed signal.
    pub peak: f32,
    /// Clipping in the captured signal, before normalisation.
    pub has_clipping: bool,
    /// DC offset measured on the input.
    pub dc_offset: f32,
}

/// Run the preprocessing steps over a PCM16 `buffer`.
pub fn preprocess(buffer: &[u8], options: PreprocessOptions) -> Preprocessed {
    let mut samples = pcm16_to_float(buffer);
    let offset = dc_offset(&samples);

    if options.remove_dc_offset && offset.abs() > DC_OFFSET_EPSILON {
        for s in samples.iter_mut() {
            *s -= offset;
        }
    }

    let clipped = has_clipping(&samples, CLIPPING_THRESHOLD);

    if options.normalize {
        let current = peak(&samples);
        if current > 0.0 {
            let gain = NORMALIZE_TARGET / current;
            for s in samples.iter_mut() {
                *s *= gain;
            }
        }
    }

    Preprocessed {
        rms: rms(&samples),
        peak: peak(&samples),
        has_clipping: clipped,
        dc_offset: offset,
        data: float_to_pcm16(&samples),
    }
}
