//! Spectral analysis: Hann-windowed radix-2 FFT and logarithmic band
//! aggregation for the live spectrum display.
//!
//! # Pipeline
//!
//! ```text
//! samples ─▶ pad/truncate to 2^k ─▶ Hann window ─▶ FFT (Cooley–Tukey)
//!         ─▶ |X[k]| / N, first N/2 bins ─▶ log-spaced bands [20 Hz, fs/2]
//!         ─▶ band averages × 10, clamped to 1.0
//! ```
//!
//! Bands are spaced by equal frequency *ratio*, not equal width, so each
//! band covers roughly the same musical interval.
//!
//! # Example
//!
//! ```rust
//! use live_meter::audio::{AudioFormat, FrequencyAnalysis};
//!
//! let format = AudioFormat::mono16(16_000);
//! let tone: Vec<f32> = (0..2_048)
//!     .map(|i| (2.0 * std::f32::consts::PI * 1_000.0 * i as f32 / 16_000.0).sin() * 0.5)
//!     .collect();
//!
//! let analysis = FrequencyAnalysis::compute(&tone, &format, 2_048, 64);
//! assert_eq!(analysis.magnitudes.len(), 64);
//! assert!((analysis.dominant_frequency - 1_000.0).abs() < 100.0);
//! ```

use std::f64::consts::PI;

use super::format::AudioFormat;

/// Default FFT length hint.
pub const DEFAULT_FFT_SIZE: usize = 2_048;

/// Default number of display bands.
pub const DEFAULT_FREQUENCY_BINS: usize = 64;

/// Lower edge of the first band in Hz.
pub const MIN_FREQUENCY: f32 = 20.0;

/// Display gain applied to band averages before clamping.
pub const MAGNITUDE_GAIN: f32 = 10.0;

/// Round an FFT size hint up to the next power of two (minimum 2).
pub fn fft_size_for(hint: usize) -> usize {
    hint.max(2).next_power_of_two()
}

/// Hann window coefficients `0.5·(1 − cos(2πi/(N−1)))`.
pub fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    let denom = (size - 1) as f64;
    (0..size)
        .map(|i| (0.5 * (1.0 - (2.0 * PI * i as f64 / denom).cos())) as f32)
        .collect()
}

/// In-place iterative radix-2 FFT over split real/imaginary buffers.
///
/// Both slices must have the same power-of-two length.
pub fn fft_in_place(re: &mut [f32], im: &mut [f32]) {
    let n = re.len();
    debug_assert_eq!(n, im.len());
    debug_assert!(n.is_power_of_two());
    if n <= 1 {
        return;
    }

    // Bit-reversal permutation
    let mut j = 0;
    for i in 0..n {
        if i < j {
            re.swap(i, j);
            im.swap(i, j);
        }
        let mut m = n >> 1;
        while m >= 1 && j >= m {
            j -= m;
            m >>= 1;
        }
        j += m;
    }

    let mut size = 2;
    while size <= n {
        let half = size / 2;
        for k in 0..half {
            let angle = -2.0 * PI * k as f64 / size as f64;
            let (w_re, w_im) = (angle.cos() as f32, angle.sin() as f32);

            for start in (0..n).step_by(size) {
                let a = start + k;
                let b = a + half;
                let t_re = re[b] * w_re - im[b] * w_im;
                let t_im = re[b] * w_im + im[b] * w_re;
                re[b] = re[a] - t_re;
                im[b] = im[a] - t_im;
                re[a] += t_re;
                im[a] += t_im;
            }
        }
        size <<= 1;
    }
}

/// Magnitude spectrum of `samples` over the positive-frequency half.
///
/// `samples` is zero-padded or truncated to `fft_size_for(fft_size_hint)`,
/// Hann-windowed and transformed.  Returns `N/2` magnitudes `|X[k]| / N`.
pub fn magnitude_spectrum(samples: &[f32], fft_size_hint: usize) -> Vec<f32> {
    let size = fft_size_for(fft_size_hint);
    let window = hann_window(size);

    let mut re = vec![0.0_f32; size];
    let mut im = vec![0.0_f32; size];
    for (slot, (&s, &w)) in re.iter_mut().zip(samples.iter().zip(&window)) {
        *slot = s * w;
    }

    fft_in_place(&mut re, &mut im);

    let scale = size as f32;
    re.iter()
        .zip(&im)
        .take(size / 2)
        .map(|(r, i)| (r * r + i * i).sqrt() / scale)
        .collect()
}

// ---------------------------------------------------------------------------
// FrequencyAnalysis
// ---------------------------------------------------------------------------

/// Band magnitudes for the spectrum display.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyAnalysis {
    /// Display magnitude per band, in `[0.0, 1.0]`.
    pub magnitudes: Vec<f32>,
    /// Centre (arithmetic midpoint) of each band in Hz.
    pub frequencies: Vec<f32>,
    /// Midpoint of the band with the largest average magnitude, `0.0` when
    /// every band is empty or silent.
    pub dominant_frequency: f32,
}

impl FrequencyAnalysis {
    /// Analyse `samples` into `target_bins` log-spaced bands between
    /// [`MIN_FREQUENCY`] and the Nyquist frequency.
    ///
    /// A non-power-of-two `fft_size` is rounded up.  Inputs shorter than the
    /// FFT are zero-padded, which lowers the effective resolution but is not
    /// an error.  Bands narrower than one FFT bin report `0.0`.
    pub fn compute(
        samples: &[f32],
        format: &AudioFormat,
        fft_size: usize,
        target_bins: usize,
    ) -> Self {
        let size = fft_size_for(fft_size);
        let nyquist = format.nyquist();

        if target_bins == 0 || nyquist <= MIN_FREQUENCY {
            return Self::zeroed(target_bins);
        }

        let spectrum = magnitude_spectrum(samples, size);
        let resolution = f64::from(format.sample_rate) / size as f64;

        let log_min = f64::from(MIN_FREQUENCY).ln();
        let step = (f64::from(nyquist).ln() - log_min) / target_bins as f64;

        let mut magnitudes = Vec::with_capacity(target_bins);
        let mut frequencies = Vec::with_capacity(target_bins);
        let mut dominant_frequency = 0.0_f32;
        let mut strongest = 0.0_f32;

        for band in 0..target_bins {
            let low = (log_min + band as f64 * step).exp();
            let high = (log_min + (band + 1) as f64 * step).exp();

            // Bins whose centre k·res lies in [low, high)
            let start = (low / resolution).ceil() as usize;
            let end = ((high / resolution).ceil() as usize).min(spectrum.len());

            let average = if start < end {
                spectrum[start..end].iter().sum::<f32>() / (end - start) as f32
            } else {
                0.0
            };

            let centre = ((low + high) / 2.0) as f32;
            if average > strongest {
                strongest = average;
                dominant_frequency = centre;
            }

            magnitudes.push((average * MAGNITUDE_GAIN).min(1.0));
            frequencies.push(centre);
        }

        Self {
            magnitudes,
            frequencies,
            dominant_frequency,
        }
    }

    /// All-zero result with `bins` entries, used when no analysis could run.
    pub fn zeroed(bins: usize) -> Self {
        Self {
            magnitudes: vec![0.0; bins],
            frequencies: vec![0.0; bins],
            dominant_frequency: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f64 / f64::from(rate);
                ((2.0 * PI * f64::from(freq) * t).sin() as f32) * amplitude
            })
            .collect()
    }

    /// Width of the log band containing `freq`.
    fn band_width_at(freq: f32, rate: u32, bins: usize) -> f32 {
        let log_min = f64::from(MIN_FREQUENCY).ln();
        let step = ((f64::from(rate) / 2.0).ln() - log_min) / bins as f64;
        let band = ((f64::from(freq).ln() - log_min) / step).floor();
        let low = (log_min + band * step).exp();
        let high = (log_min + (band + 1.0) * step).exp();
        (high - low) as f32
    }

    #[test]
    fn size_rounds_up_to_power_of_two() {
        assert_eq!(fft_size_for(2_048), 2_048);
        assert_eq!(fft_size_for(1_000), 1_024);
        assert_eq!(fft_size_for(2_049), 4_096);
        assert_eq!(fft_size_for(0), 2);
    }

    #[test]
    fn hann_window_tapers_to_zero() {
        let w = hann_window(9);
        assert!(w[0].abs() < 1e-7);
        assert!(w[8].abs() < 1e-7);
        assert!((w[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn impulse_has_flat_spectrum() {
        let mut re = vec![0.0_f32; 8];
        let mut im = vec![0.0_f32; 8];
        re[0] = 1.0;
        fft_in_place(&mut re, &mut im);
        for k in 0..8 {
            assert!((re[k] - 1.0).abs() < 1e-6 && im[k].abs() < 1e-6);
        }
    }

    #[test]
    fn fft_matches_direct_dft() {
        let input: Vec<f32> = (0..16).map(|i| ((i * 7 % 5) as f32) - 2.0).collect();
        let mut re = input.clone();
        let mut im = vec![0.0_f32; 16];
        fft_in_place(&mut re, &mut im);

        for k in 0..16 {
            let (mut dr, mut di) = (0.0_f64, 0.0_f64);
            for (n, &x) in input.iter().enumerate() {
                let angle = -2.0 * PI * (k * n) as f64 / 16.0;
                dr += f64::from(x) * angle.cos();
                di += f64::from(x) * angle.sin();
            }
            assert!((f64::from(re[k]) - dr).abs() < 1e-4, "re[{k}]");
            assert!((f64::from(im[k]) - di).abs() < 1e-4, "im[{k}]");
        }
    }

    #[test]
    fn magnitude_spectrum_peaks_at_tone_bin() {
        // 1000 Hz at 16 kHz with N = 2048 lands exactly on bin 128
        let tone = sine(1_000.0, 16_000, 2_048, 0.5);
        let spectrum = magnitude_spectrum(&tone, 2_048);
        assert_eq!(spectrum.len(), 1_024);

        let (peak_bin, _) = spectrum
            .iter()
            .enumerate()
            .fold((0, 0.0_f32), |best, (k, &m)| if m > best.1 { (k, m) } else { best });
        assert_eq!(peak_bin, 128);
    }

    #[test]
    fn dominant_frequency_within_one_band_of_tone() {
        for &(freq, rate) in &[(1_000.0_f32, 16_000_u32), (440.0, 44_100), (3_000.0, 48_000)] {
            let fft_size = 4_096;
            assert!(fft_size as f32 >= 2.0 * rate as f32 / freq);
            let tone = sine(freq, rate, fft_size, 0.5);
            let format = AudioFormat::mono16(rate);
            let analysis = FrequencyAnalysis::compute(&tone, &format, fft_size, 64);
            let tolerance = band_width_at(freq, rate, 64);
            assert!(
                (analysis.dominant_frequency - freq).abs() <= tolerance,
                "freq={freq} rate={rate} dominant={} tolerance={tolerance}",
                analysis.dominant_frequency
            );
        }
    }

    #[test]
    fn dominant_frequency_within_one_bin_at_smallest_fft() {
        for &(freq, rate) in &[(1_000.0_f32, 16_000_u32), (440.0, 44_100)] {
            let fft_size = fft_size_for((2.0 * rate as f32 / freq).ceil() as usize);
            let resolution = rate as f32 / fft_size as f32;
            let tone = sine(freq, rate, fft_size, 0.5);
            let format = AudioFormat::mono16(rate);
            let analysis = FrequencyAnalysis::compute(&tone, &format, fft_size, 64);
            assert!(
                (analysis.dominant_frequency - freq).abs() <= resolution,
                "freq={freq} rate={rate} size={fft_size} dominant={} resolution={resolution}",
                analysis.dominant_frequency
            );
        }
    }

    #[test]
    fn bins_land_in_the_band_holding_their_frequency() {
        // 16 kHz, N = 32: bins sit at multiples of 500 Hz.  Bin 2 (1000 Hz)
        // is the only bin inside the band spanning 1000 Hz.
        let format = AudioFormat::mono16(16_000);
        let tone = sine(1_000.0, 16_000, 32, 0.5);
        let analysis = FrequencyAnalysis::compute(&tone, &format, 32, 64);

        let log_min = f64::from(MIN_FREQUENCY).ln();
        let step = (8_000.0_f64.ln() - log_min) / 64.0;
        let band = ((1_000.0_f64.ln() - log_min) / step).floor() as usize;
        assert!(analysis.magnitudes[band] > 0.0);
        assert_eq!(analysis.dominant_frequency, analysis.frequencies[band]);
    }

    #[test]
    fn band_layout_is_logarithmic() {
        let analysis = FrequencyAnalysis::compute(&[], &AudioFormat::mono16(16_000), 2_048, 32);
        assert_eq!(analysis.frequencies.len(), 32);
        assert!(analysis.frequencies.windows(2).all(|w| w[1] > w[0]));
        // Equal ratio spacing: successive centre ratios are constant
        let r0 = analysis.frequencies[1] / analysis.frequencies[0];
        let r1 = analysis.frequencies[20] / analysis.frequencies[19];
        assert!((r0 - r1).abs() < 1e-3);
    }

    #[test]
    fn magnitudes_are_clamped_to_unit_range() {
        let loud = sine(1_000.0, 16_000, 2_048, 1.0);
        let analysis = FrequencyAnalysis::compute(&loud, &AudioFormat::mono16(16_000), 2_048, 64);
        assert!(analysis.magnitudes.iter().all(|&m| (0.0..=1.0).contains(&m)));
    }

    #[test]
    fn short_input_is_zero_padded() {
        let tone = sine(1_000.0, 16_000, 300, 0.5);
        let analysis = FrequencyAnalysis::compute(&tone, &AudioFormat::mono16(16_000), 1_500, 16);
        assert_eq!(analysis.magnitudes.len(), 16);
        assert!(analysis.dominant_frequency > 0.0);
    }

    #[test]
    fn silence_has_no_dominant_frequency() {
        let analysis =
            FrequencyAnalysis::compute(&vec![0.0; 2_048], &AudioFormat::mono16(16_000), 2_048, 64);
        assert_eq!(analysis.dominant_frequency, 0.0);
        assert!(analysis.magnitudes.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn zeroed_keeps_pairing() {
        let z = FrequencyAnalysis::zeroed(8);
        assert_eq!(z.magnitudes.len(), z.frequencies.len());
        assert_eq!(z.dominant_frequency, 0.0);
    }
}
