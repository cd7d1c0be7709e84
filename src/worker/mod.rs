//! Background execution of the audio engines.
//!
//! # Architecture
//!
//! ```text
//! caller ──▶ AudioOrchestrator ──┬─▶ WorkerContext ("audio-worker" thread)
//!   ▲          │ pending map      │      └─ RequestHandler::handle
//!   │          │ timers           │
//!   │          └─ inline fallback ◀┘ (not ready / small / timeout / error)
//!   └──────────── Result<…, DispatchError>
//! ```
//!
//! * [`protocol`]: request/response/event sum types and result payloads.
//! * [`handlers`]: the four analysis handlers, shared by both paths.
//! * [`context`]: the worker thread and the [`RequestHandler`] seam.
//! * [`orchestrator`]: lifecycle, correlation, timeouts, fallback.
//! * [`analyzer`]: the [`AudioAnalyzer`] trait and [`InlineAnalyzer`].
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use live_meter::audio::AudioFormat;
//! use live_meter::worker::{AudioOrchestrator, OrchestratorConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let orchestrator = AudioOrchestrator::new(OrchestratorConfig::default());
//!     orchestrator.wait_ready(Duration::from_secs(1)).await;
//!
//!     let pcm = vec![0u8; 3_200]; // 100 ms of silence at 16 kHz
//!     let format = AudioFormat::mono16(16_000);
//!
//!     let chunk = orchestrator.process_audio_chunk(&pcm, format, 28).await.unwrap();
//!     let spectrum = orchestrator.compute_fft(&pcm, format, 2_048, 64).await.unwrap();
//!     println!("{:.1} dB, dominant {} Hz", chunk.rms_db, spectrum.dominant_frequency);
//!
//!     orchestrator.terminate();
//! }
//! ```

pub mod analyzer;
pub mod context;
pub mod handlers;
pub mod orchestrator;
pub mod protocol;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use analyzer::{AudioAnalyzer, InlineAnalyzer};
pub use context::{AnalysisHandler, RequestHandler, WorkerContext};
pub use handlers::HandlerError;
pub use orchestrator::{AudioOrchestrator, DispatchError, OrchestratorConfig, WorkerState};
pub use protocol::{
    ChunkAnalysis, PreprocessResult, RequestId, SpectrumResult, WaveformResult, WorkerEvent,
    WorkerRequest, WorkerResponse,
};
