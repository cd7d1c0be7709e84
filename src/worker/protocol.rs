//! Typed messages exchanged between the orchestrator and the worker context.
//!
//! Requests carry their PCM payload by value: once a request is sent, the
//! worker owns the buffer.  The orchestrator sends a copy of the caller's
//! slice so the caller's buffer stays usable.
//!
//! Every response carries the `request_id` of the request it answers.
//! Responses may be read in any order; callers correlate by id only.

use serde::Serialize;

use crate::audio::{AudioFormat, PreprocessOptions};

/// Caller-generated id, unique among in-flight requests.
pub type RequestId = u64;

// ---------------------------------------------------------------------------
// Result payloads
// ---------------------------------------------------------------------------

/// Result of `processAudioChunk`: bars plus whole-chunk levels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkAnalysis {
    pub bars: Vec<f32>,
    pub rms_level: f32,
    pub peak_level: f32,
    pub rms_db: f32,
    /// Handler wall time; instrumentation only.
    pub duration_ms: f64,
}

/// Result of `generateWaveform`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveformResult {
    pub bars: Vec<f32>,
    pub peaks: Vec<f32>,
    pub duration_ms: f64,
}

/// Result of `computeFFT`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumResult {
    pub magnitudes: Vec<f32>,
    pub frequencies: Vec<f32>,
    pub dominant_frequency: f32,
    pub duration_ms: f64,
}

impl SpectrumResult {
    /// All-zero spectrum returned when no worker can run the FFT.
    pub fn zeroed(bins: usize) -> Self {
        Self {
            magnitudes: vec![0.0; bins],
            frequencies: vec![0.0; bins],
            dominant_frequency: 0.0,
            duration_ms: 0.0,
        }
    }
}

/// Result of `preprocessChunk`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreprocessResult {
    /// Re-encoded PCM16; ownership passes to the caller.
    #[serde(skip_serializing)]
    pub processed_data: Vec<u8>,
    pub rms_level: f32,
    pub peak_level: f32,
    pub has_clipping: bool,
    pub dc_offset: f32,
    pub duration_ms: f64,
}

// ---------------------------------------------------------------------------
// WorkerRequest
// ---------------------------------------------------------------------------

/// A unit of work for the worker context.
#[derive(Debug)]
pub enum WorkerRequest {
    ProcessAudioChunk {
        request_id: RequestId,
        data: Vec<u8>,
        format: AudioFormat,
        bar_count: usize,
    },
    GenerateWaveform {
        request_id: RequestId,
        data: Vec<u8>,
        format: AudioFormat,
        bar_count: usize,
    },
    ComputeFft {
        request_id: RequestId,
        data: Vec<u8>,
        format: AudioFormat,
        fft_size: usize,
        frequency_bins: usize,
    },
    PreprocessChunk {
        request_id: RequestId,
        data: Vec<u8>,
        format: AudioFormat,
        options: PreprocessOptions,
    },
}

impl WorkerRequest {
    pub fn request_id(&self) -> RequestId {
        match self {
            WorkerRequest::ProcessAudioChunk { request_id, .. }
            | WorkerRequest::GenerateWaveform { request_id, .. }
            | WorkerRequest::ComputeFft { request_id, .. }
            | WorkerRequest::PreprocessChunk { request_id, .. } => *request_id,
        }
    }

    /// Short operation name for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            WorkerRequest::ProcessAudioChunk { .. } => "processAudioChunk",
            WorkerRequest::GenerateWaveform { .. } => "generateWaveform",
            WorkerRequest::ComputeFft { .. } => "computeFFT",
            WorkerRequest::PreprocessChunk { .. } => "preprocessChunk",
        }
    }
}

// ---------------------------------------------------------------------------
// WorkerResponse
// ---------------------------------------------------------------------------

/// Answer to one [`WorkerRequest`], or a correlated handler error.
#[derive(Debug)]
pub enum WorkerResponse {
    ProcessAudioChunk {
        request_id: RequestId,
        result: ChunkAnalysis,
    },
    GenerateWaveform {
        request_id: RequestId,
        result: WaveformResult,
    },
    ComputeFft {
        request_id: RequestId,
        result: SpectrumResult,
    },
    PreprocessChunk {
        request_id: RequestId,
        result: PreprocessResult,
    },
    Error {
        request_id: RequestId,
        message: String,
    },
}

impl WorkerResponse {
    pub fn request_id(&self) -> RequestId {
        match self {
            WorkerResponse::ProcessAudioChunk { request_id, .. }
            | WorkerResponse::GenerateWaveform { request_id, .. }
            | WorkerResponse::ComputeFft { request_id, .. }
            | WorkerResponse::PreprocessChunk { request_id, .. }
            | WorkerResponse::Error { request_id, .. } => *request_id,
        }
    }
}

// ---------------------------------------------------------------------------
// WorkerEvent
// ---------------------------------------------------------------------------

/// Everything the worker context emits.
#[derive(Debug)]
pub enum WorkerEvent {
    /// Unsolicited signal that the context accepts work.
    Ready,
    /// Answer to a request.
    Response(WorkerResponse),
    /// The context hit an unrecoverable fault and is exiting.
    Fault(String),
}
