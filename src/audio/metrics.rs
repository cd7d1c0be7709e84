//! Level metrics over a run of normalised samples.
//!
//! | Metric | Definition | Empty input |
//! |--------|------------|-------------|
//! | RMS | `sqrt(mean(s²))` | `0.0` |
//! | Peak | `max(|s|)` | `0.0` |
//! | dB | `20·log10(rms)` | [`DB_FLOOR`] when `rms <= 0` |
//! | DC offset | `mean(s)` | `0.0` |
//! | Clipping | any `|s| >= threshold` | `false` |
//!
//! # Example
//!
//! ```rust
//! use live_meter::audio::metrics::{SignalLevels, DB_FLOOR};
//!
//! let silence = vec![0.0_f32; 1_024];
//! let levels = SignalLevels::measure(&silence);
//! assert_eq!(levels.rms, 0.0);
//! assert_eq!(levels.rms_db, DB_FLOOR);
//! assert!(!levels.has_clipping);
//! ```

/// Decibel value reported for silence instead of `-inf`.
pub const DB_FLOOR: f32 = -100.0;

/// Absolute amplitude at or above which a sample counts as clipped.
pub const CLIPPING_THRESHOLD: f32 = 0.99;

/// Root mean square of `samples`; `0.0` when empty.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// Largest absolute sample; `0.0` when empty.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}

/// Convert a linear RMS level to decibels full-scale.
pub fn to_db(rms: f32) -> f32 {
    if rms > 0.0 {
        20.0 * rms.log10()
    } else {
        DB_FLOOR
    }
}

/// Mean sample value (constant bias); `0.0` when empty.
pub fn dc_offset(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| f64::from(s)).sum();
    (sum / samples.len() as f64) as f32
}

/// `true` if any sample reaches `threshold` in absolute value.
pub fn has_clipping(samples: &[f32], threshold: f32) -> bool {
    samples.iter().any(|s| s.abs() >= threshold)
}

// ---------------------------------------------------------------------------
// SignalLevels
// ---------------------------------------------------------------------------

/// All level metrics for one buffer, computed in a single call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalLevels {
    pub rms: f32,
    pub peak: f32,
    pub rms_db: f32,
    pub dc_offset: f32,
    /// Clipping against [`CLIPPING_THRESHOLD`].
    pub has_clipping: bool,
}

impl SignalLevels {
    pub fn measure(samples: &[f32]) -> Self {
        let rms = rms(samples);
        Self {
            rms,
            peak: peak(samples),
            rms_db: to_db(rms),
            dc_offset: dc_offset(samples),
            has_clipping: has_clipping(samples, CLIPPING_THRESHOLD),
        }
    }
}
