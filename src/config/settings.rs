//! Settings structs, defaults and TOML persistence.
//!
//! Every section is `#[serde(default)]`, so a `settings.toml` that only
//! names the keys a user changed still loads.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::audio::spectrum::{DEFAULT_FFT_SIZE, DEFAULT_FREQUENCY_BINS};

use super::AppPaths;

// ---------------------------------------------------------------------------
// WorkerConfig
// ---------------------------------------------------------------------------

/// Background worker dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Start the background context at all.  When `false` every operation
    /// runs on the caller.
    pub enabled: bool,
    /// Milliseconds to wait for a worker response before giving up on it.
    pub timeout_ms: u64,
    /// Payloads shorter than this many bytes skip the worker (FFT excepted).
    pub min_dispatch_bytes: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 5_000,
            min_dispatch_bytes: 512,
        }
    }
}

// ---------------------------------------------------------------------------
// AnalysisConfig
// ---------------------------------------------------------------------------

/// Engine parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Waveform bars per chunk.
    pub bar_count: usize,
    /// FFT size hint; rounded up to the next power of two.
    pub fft_size: usize,
    /// Log-spaced spectrum bands.
    pub frequency_bins: usize,
    /// Peak-normalise in the preprocessing step.
    pub normalize: bool,
    /// Remove DC bias in the preprocessing step.
    pub remove_dc_offset: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bar_count: 28,
            fft_size: DEFAULT_FFT_SIZE,
            frequency_bins: DEFAULT_FREQUENCY_BINS,
            normalize: false,
            remove_dc_offset: true,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Input stream description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate of the incoming mono PCM16 stream, in Hz.
    pub sample_rate: u32,
    /// Length of each analysed chunk in milliseconds.
    pub chunk_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            chunk_ms: 100,
        }
    }
}

impl AudioConfig {
    /// Bytes in one chunk of mono PCM16 at the configured rate.  Never zero.
    pub fn chunk_bytes(&self) -> usize {
        let samples = u64::from(self.sample_rate) * u64::from(self.chunk_ms) / 1_000;
        (samples as usize).max(1) * 2
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use live_meter::config::AppConfig;
///
/// // Missing file means defaults
/// let mut config = AppConfig::load().unwrap();
/// config.analysis.bar_count = 40;
/// config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub worker: WorkerConfig,
    pub analysis: AnalysisConfig,
    pub audio: AudioConfig,
}

impl AppConfig {
    /// Load from the platform `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Save to the platform `settings.toml`, creating parent directories.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
