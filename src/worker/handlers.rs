//! The four analysis handlers.
//!
//! These are plain functions so the worker context and the orchestrator's
//! inline fallback run exactly the same code.  Each one validates the
//! format, decodes the PCM, runs the relevant engine and stamps the wall
//! time it took.

use std::time::Instant;

use thiserror::Error;

use crate::audio::{
    pcm16_to_float, preprocess, AudioFormat, FormatError, FrequencyAnalysis, PreprocessOptions,
    SignalLevels, WaveformData,
};

use super::protocol::{
    ChunkAnalysis, PreprocessResult, SpectrumResult, WaveformResult, WorkerRequest,
    WorkerResponse,
};

// ---------------------------------------------------------------------------
// HandlerError
// ---------------------------------------------------------------------------

/// Failure while handling one request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HandlerError {
    /// The request's format descriptor is not supported.
    #[error("invalid audio format: {0}")]
    InvalidFormat(#[from] FormatError),

    /// The handler panicked; the context survives.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// The context cannot continue.  Every pending request fails and the
    /// worker is disabled.
    #[error("worker context fault: {0}")]
    Fatal(String),
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1_000.0
}

pub fn process_audio_chunk(
    data: &[u8],
    format: &AudioFormat,
    bar_count: usize,
) -> Result<ChunkAnalysis, HandlerError> {
    let start = Instant::now();
    format.validate()?;

    let samples = pcm16_to_float(data);
    let waveform = WaveformData::compute(&samples, bar_count);
    let levels = SignalLevels::measure(&samples);

    Ok(ChunkAnalysis {
        bars: waveform.bars,
        rms_level: levels.rms,
        peak_level: levels.peak,
        rms_db: levels.rms_db,
        duration_ms: elapsed_ms(start),
    })
}

pub fn generate_waveform(
    data: &[u8],
    format: &AudioFormat,
    bar_count: usize,
) -> Result<WaveformResult, HandlerError> {
    let start = Instant::now();
    format.validate()?;

    let waveform = WaveformData::compute(&pcm16_to_float(data), bar_count);

    Ok(WaveformResult {
        bars: waveform.bars,
        peaks: waveform.peaks,
        duration_ms: elapsed_ms(start),
    })
}

pub fn compute_fft(
    data: &[u8],
    format: &AudioFormat,
    fft_size: usize,
    frequency_bins: usize,
) -> Result<SpectrumResult, HandlerError> {
    let start = Instant::now();
    format.validate()?;

    let analysis =
        FrequencyAnalysis::compute(&pcm16_to_float(data), format, fft_size, frequency_bins);

    Ok(SpectrumResult {
        magnitudes: analysis.magnitudes,
        frequencies: analysis.frequencies,
        dominant_frequency: analysis.dominant_frequency,
        duration_ms: elapsed_ms(start),
    })
}

pub fn preprocess_chunk(
    data: &[u8],
    format: &AudioFormat,
    options: PreprocessOptions,
) -> Result<PreprocessResult, HandlerError> {
    let start = Instant::now();
    format.validate()?;

    let processed = preprocess(data, options);

    Ok(PreprocessResult {
        processed_data: processed.data,
        rms_level: processed.rms,
        peak_level: processed.peak,
        has_clipping: processed.has_clipping,
        dc_offset: processed.dc_offset,
        duration_ms: elapsed_ms(start),
    })
}

/// Run the handler matching `request` and wrap its result in the mirrored
/// response variant.
pub fn handle(request: WorkerRequest) -> Result<WorkerResponse, HandlerError> {
    let response = match request {
        WorkerRequest::ProcessAudioChunk {
            request_id,
            data,
            format,
            bar_count,
        } => WorkerResponse::ProcessAudioChunk {
            request_id,
            result: process_audio_chunk(&data, &format, bar_count)?,
        },
        WorkerRequest::GenerateWaveform {
            request_id,
            data,
            format,
            bar_count,
        } => WorkerResponse::GenerateWaveform {
            request_id,
            result: generate_waveform(&data, &format, bar_count)?,
        },
        WorkerRequest::ComputeFft {
            request_id,
            data,
            format,
            fft_size,
            frequency_bins,
        } => WorkerResponse::ComputeFft {
            request_id,
            result: compute_fft(&data, &format, fft_size, frequency_bins)?,
        },
        WorkerRequest::PreprocessChunk {
            request_id,
            data,
            format,
            options,
        } => WorkerResponse::PreprocessChunk {
            request_id,
            result: preprocess_chunk(&data, &format, options)?,
        },
    };
    Ok(response)
}
