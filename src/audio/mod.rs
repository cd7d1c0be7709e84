//! Signal-processing engines for live recording feedback.
//!
//! # Pipeline
//!
//! ```text
//! PCM16 bytes ─▶ pcm16_to_float ─▶ SignalLevels      (RMS, peak, dB, DC, clipping)
//!                               ├─▶ WaveformData      (N display bars + peaks)
//!                               ├─▶ FrequencyAnalysis (log-spaced spectrum)
//!                               └─▶ preprocess        (DC removal, normalise → PCM16)
//! ```
//!
//! Every engine is a pure function of its input; the [`crate::worker`]
//! module decides which thread runs them.
//!
//! # Quick Start
//!
//! ```rust
//! use live_meter::audio::{pcm16_to_float, SignalLevels, WaveformData};
//!
//! let pcm: Vec<u8> = (0..1_600i16).flat_map(|i| (i * 8).to_le_bytes()).collect();
//! let samples = pcm16_to_float(&pcm);
//!
//! let levels = SignalLevels::measure(&samples);
//! let waveform = WaveformData::compute(&samples, 28);
//! assert!(levels.rms <= levels.peak);
//! assert_eq!(waveform.len(), 28);
//! ```

pub mod convert;
pub mod format;
pub mod metrics;
pub mod preprocess;
pub mod spectrum;
pub mod waveform;

pub use convert::{float_to_pcm16, pcm16_to_float, try_pcm16_to_float, ConversionError};
pub use format::{AudioFormat, FormatError};
pub use metrics::SignalLevels;
pub use preprocess::{preprocess, PreprocessOptions, Preprocessed};
pub use spectrum::FrequencyAnalysis;
pub use waveform::WaveformData;
