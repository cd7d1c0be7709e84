//! Command-line front end: replays a raw PCM recording through the
//! analysis engines chunk by chunk and prints one JSON line per chunk.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] (explicit `--config` path or the platform default)
//!    and apply command-line overrides.
//! 3. Start the [`AudioOrchestrator`] and wait up to one second for the
//!    worker, or use [`InlineAnalyzer`] when the worker is disabled.
//! 4. Split the file into `chunk_ms` chunks and analyse each in order.

use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use live_meter::{
    audio::{AudioFormat, PreprocessOptions},
    config::AppConfig,
    worker::{
        AudioAnalyzer, AudioOrchestrator, ChunkAnalysis, InlineAnalyzer, OrchestratorConfig,
        PreprocessResult, SpectrumResult, WaveformResult,
    },
};

const READY_TIMEOUT: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "live-meter")]
#[command(about = "Waveform, level and spectrum analysis of raw PCM16 audio")]
#[command(version)]
struct Cli {
    /// Raw mono signed 16-bit little-endian PCM file
    pcm_file: PathBuf,

    /// Sample rate of the input in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Waveform bars per chunk
    #[arg(long)]
    bars: Option<usize>,

    /// FFT size hint (rounded up to a power of two)
    #[arg(long)]
    fft_size: Option<usize>,

    /// Log-spaced spectrum bands
    #[arg(long)]
    bins: Option<usize>,

    /// Chunk length in milliseconds
    #[arg(long)]
    chunk_ms: Option<u32>,

    /// Run DC removal (and normalisation, with --normalize) before analysis
    #[arg(long)]
    preprocess: bool,

    /// Peak-normalise during preprocessing
    #[arg(long)]
    normalize: bool,

    /// Also emit bars and peaks from the waveform engine
    #[arg(long)]
    waveform: bool,

    /// Settings file to use instead of the platform default
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(rate) = self.sample_rate {
            config.audio.sample_rate = rate;
        }
        if let Some(ms) = self.chunk_ms {
            config.audio.chunk_ms = ms;
        }
        if let Some(bars) = self.bars {
            config.analysis.bar_count = bars;
        }
        if let Some(size) = self.fft_size {
            config.analysis.fft_size = size;
        }
        if let Some(bins) = self.bins {
            config.analysis.frequency_bins = bins;
        }
        if self.normalize {
            config.analysis.normalize = true;
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChunkReport {
    chunk: usize,
    offset_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    preprocess: Option<PreprocessResult>,
    levels: ChunkAnalysis,
    spectrum: SpectrumResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    waveform: Option<WaveformResult>,
}

async fn analyse_chunk(
    analyzer: &dyn AudioAnalyzer,
    cli: &Cli,
    config: &AppConfig,
    format: AudioFormat,
    chunk: &[u8],
) -> Result<(Option<PreprocessResult>, ChunkAnalysis, SpectrumResult, Option<WaveformResult>)> {
    let preprocessed = if cli.preprocess {
        let options = PreprocessOptions {
            normalize: config.analysis.normalize,
            remove_dc_offset: config.analysis.remove_dc_offset,
        };
        Some(analyzer.preprocess_chunk(chunk, format, options).await?)
    } else {
        None
    };
    let data = preprocessed.as_ref().map_or(chunk, |p| p.processed_data.as_slice());

    let bars = config.analysis.bar_count;
    let levels = analyzer.process_audio_chunk(data, format, bars).await?;
    let spectrum = analyzer
        .compute_fft(data, format, config.analysis.fft_size, config.analysis.frequency_bins)
        .await?;
    let waveform = if cli.waveform {
        Some(analyzer.generate_waveform(data, format, bars).await?)
    } else {
        None
    };

    Ok((preprocessed, levels, spectrum, waveform))
}

/// Start time of the sample at `byte_offset`, in milliseconds.
fn offset_ms(byte_offset: usize, format: &AudioFormat) -> f64 {
    let samples = byte_offset / format.bytes_per_sample();
    samples as f64 * 1_000.0 / f64::from(format.sample_rate)
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // 2. Configuration
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e:#}); using defaults");
            AppConfig::default()
        }),
    };
    cli.apply(&mut config);

    let format = AudioFormat::mono16(config.audio.sample_rate);
    format.validate()?;

    let pcm = std::fs::read(&cli.pcm_file)
        .with_context(|| format!("reading {}", cli.pcm_file.display()))?;
    log::info!(
        "{}: {} bytes at {} Hz, {} ms chunks",
        cli.pcm_file.display(),
        pcm.len(),
        format.sample_rate,
        config.audio.chunk_ms
    );

    // 3. Analyzer
    let analyzer: Box<dyn AudioAnalyzer> = if config.worker.enabled {
        let orchestrator = AudioOrchestrator::new(OrchestratorConfig::from(&config.worker));
        let settings = orchestrator.config();
        log::info!(
            "audio worker: {:?} timeout, inline below {} bytes",
            settings.timeout,
            settings.min_dispatch_bytes
        );
        if !orchestrator.wait_ready(READY_TIMEOUT).await {
            log::warn!("audio worker not ready after {READY_TIMEOUT:?}; running inline");
        }
        Box::new(orchestrator)
    } else {
        log::info!("audio worker disabled; running inline");
        Box::new(InlineAnalyzer)
    };

    // 4. Chunks
    let chunk_bytes = config.audio.chunk_bytes();
    let mut out = BufWriter::new(std::io::stdout().lock());

    for (index, chunk) in pcm.chunks(chunk_bytes).enumerate() {
        let (preprocess, levels, spectrum, waveform) =
            analyse_chunk(&*analyzer, &cli, &config, format, chunk).await?;

        let report = ChunkReport {
            chunk: index,
            offset_ms: offset_ms(index * chunk_bytes, &format),
            preprocess,
            levels,
            spectrum,
            waveform,
        };
        serde_json::to_writer(&mut out, &report)?;
        writeln!(out)?;
    }
    out.flush()?;

    log::info!("analysed {} chunks", pcm.len().div_ceil(chunk_bytes));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_config_values() {
        let cli = Cli::parse_from([
            "live-meter",
            "in.pcm",
            "--sample-rate",
            "44100",
            "--bars",
            "40",
            "--bins",
            "32",
            "--normalize",
        ]);
        let mut config = AppConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.analysis.bar_count, 40);
        assert_eq!(config.analysis.frequency_bins, 32);
        assert_eq!(config.analysis.fft_size, 2_048);
        assert!(config.analysis.normalize);
        assert!(!cli.preprocess);
    }

    #[test]
    fn chunk_offsets_follow_sample_rate() {
        let format = AudioFormat::mono16(16_000);
        assert_eq!(offset_ms(0, &format), 0.0);
        assert_eq!(offset_ms(3_200, &format), 100.0);
        assert_eq!(offset_ms(32_000, &AudioFormat::mono16(8_000)), 2_000.0);
    }

    #[tokio::test]
    async fn preprocessed_chunk_feeds_analysis() {
        let cli = Cli::parse_from(["live-meter", "in.pcm", "--preprocess", "--waveform"]);
        let config = AppConfig::default();
        let chunk: Vec<u8> = (0..1_600i16)
            .flat_map(|i| ((i % 64) * 100).to_le_bytes())
            .collect();

        let (pre, levels, spectrum, waveform) = analyse_chunk(
            &InlineAnalyzer,
            &cli,
            &config,
            AudioFormat::mono16(16_000),
            &chunk,
        )
        .await
        .unwrap();

        let pre = pre.unwrap();
        assert!(pre.dc_offset > 0.0);
        assert!((levels.peak_level - pre.peak_level).abs() < 1e-4);
        assert_eq!(spectrum.magnitudes.len(), 64);
        assert_eq!(waveform.unwrap().bars.len(), 28);
    }
}
