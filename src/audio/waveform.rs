//! Waveform bar data for the live recording visualisation.
//!
//! The input run is split into `bar_count` equal windows.  Each window yields
//! a display height (RMS scaled by [`BAR_GAIN`], clamped to
//! `[BAR_FLOOR, 1.0]`) and the unscaled absolute peak.  The output always has
//! exactly `bar_count` entries, even for empty input, so bars never collapse
//! to zero width in the UI.
//!
//! # Example
//!
//! ```rust
//! use live_meter::audio::WaveformData;
//!
//! // 1 second of a quiet tone at 16 kHz
//! let audio: Vec<f32> = (0..16_000)
//!     .map(|i| (i as f32 * 0.05).sin() * 0.1)
//!     .collect();
//!
//! let waveform = WaveformData::compute(&audio, 28);
//! assert_eq!(waveform.bars.len(), 28);
//! assert_eq!(waveform.peaks.len(), 28);
//! for &bar in &waveform.bars {
//!     assert!((0.15..=1.0).contains(&bar));
//! }
//! ```

use super::metrics::{peak, rms};

/// Minimum bar height.
pub const BAR_FLOOR: f32 = 0.15;

/// Gain applied to window RMS so speech-level signals (RMS ~0.1–0.3) fill
/// most of the bar without saturating it.
pub const BAR_GAIN: f32 = 3.0;

// ---------------------------------------------------------------------------
// WaveformData
// ---------------------------------------------------------------------------

/// Bar heights and peaks for the waveform widget.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformData {
    /// Display height per bar, in `[BAR_FLOOR, 1.0]`.
    pub bars: Vec<f32>,
    /// Absolute peak per bar, in `[0.0, 1.0]`, not scaled.
    pub peaks: Vec<f32>,
}

impl WaveformData {
    /// Compute `bar_count` bars from `samples`.
    ///
    /// Each bar covers `max(1, samples.len() / bar_count)` samples.  Bars
    /// whose window starts past the end of the input get `BAR_FLOOR` height
    /// and a `0.0` peak; trailing samples that do not fill a whole window
    /// are ignored.
    pub fn compute(samples: &[f32], bar_count: usize) -> Self {
        let mut bars = Vec::with_capacity(bar_count);
        let mut peaks = Vec::with_capacity(bar_count);

        if bar_count == 0 {
            return Self { bars, peaks };
        }

        let total = samples.len();
        let samples_per_bar = (total / bar_count).max(1);

        for i in 0..bar_count {
            let start = i * samples_per_bar;
            if start >= total {
                bars.push(BAR_FLOOR);
                peaks.push(0.0);
                continue;
            }
            let end = ((i + 1) * samples_per_bar).min(total);
            let window = &samples[start..end];

            bars.push((rms(window) * BAR_GAIN).clamp(BAR_FLOOR, 1.0));
            peaks.push(peak(window));
        }

        Self { bars, peaks }
    }

    /// Number of bars.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Returns `true` when there are no bars.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_count_holds_for_any_length() {
        for len in [0, 1, 5, 27, 28, 29, 512, 16_000] {
            for count in [1, 8, 28, 64] {
                let audio = vec![0.2_f32; len];
                let w = WaveformData::compute(&audio, count);
                assert_eq!(w.bars.len(), count, "len={len} count={count}");
                assert_eq!(w.peaks.len(), count, "len={len} count={count}");
            }
        }
    }

    #[test]
    fn empty_audio_returns_floor_bars() {
        let w = WaveformData::compute(&[], 10);
        assert!(w.bars.iter().all(|&b| b == BAR_FLOOR));
        assert!(w.peaks.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn silent_audio_sits_on_floor() {
        let w = WaveformData::compute(&vec![0.0_f32; 1_600], 10);
        assert!(w.bars.iter().all(|&b| b == BAR_FLOOR));
        assert!(w.peaks.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn loud_audio_saturates_at_one() {
        let w = WaveformData::compute(&vec![0.9_f32; 1_600], 10);
        assert!(w.bars.iter().all(|&b| b == 1.0));
        assert!(w.peaks.iter().all(|&p| (p - 0.9).abs() < 1e-6));
    }

    #[test]
    fn speech_level_rms_is_scaled() {
        // Constant 0.1 → RMS 0.1 → height 0.3
        let w = WaveformData::compute(&vec![0.1_f32; 1_000], 4);
        for &b in &w.bars {
            assert!((b - 0.3).abs() < 1e-5, "bar = {b}");
        }
    }

    #[test]
    fn short_input_pads_with_floor() {
        // 3 samples, 10 bars → one sample per bar, bars 3.. are padding
        let w = WaveformData::compute(&[0.5, -0.5, 0.5], 10);
        assert_eq!(w.len(), 10);
        assert_eq!(&w.peaks[..3], &[0.5, 0.5, 0.5]);
        assert!(w.bars[3..].iter().all(|&b| b == BAR_FLOOR));
        assert!(w.peaks[3..].iter().all(|&p| p == 0.0));
    }

    #[test]
    fn peak_is_unscaled_window_maximum() {
        let mut audio = vec![0.0_f32; 100];
        audio[7] = -0.4;
        audio[60] = 0.25;
        let w = WaveformData::compute(&audio, 2);
        assert_eq!(w.peaks, vec![0.4, 0.25]);
    }

    #[test]
    fn zero_bar_count_returns_empty() {
        let w = WaveformData::compute(&[0.5; 100], 0);
        assert!(w.is_empty());
        assert!(w.peaks.is_empty());
    }
}
