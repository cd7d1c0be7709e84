//! Dispatch orchestrator.  Owns the worker context and decides, per call,
//! whether work runs there or inline.
//!
//! # Dispatch policy
//!
//! Evaluated in order for every call:
//!
//! | Condition | Path |
//! |-----------|------|
//! | Worker not [`WorkerState::Ready`] | inline |
//! | Payload `< min_dispatch_bytes` | inline |
//! | Otherwise | worker, falling back inline on timeout or error |
//!
//! `compute_fft` has no inline path.  When the worker is unavailable, or
//! the request times out, it resolves to [`SpectrumResult::zeroed`].
//!
//! # Correlation
//!
//! ```text
//! dispatch ─▶ pending[id] = {reply, timer} ─▶ context.send(request)
//!
//! reader task:  Response(id) ─▶ pending.remove(id) ─▶ abort timer, reply Ok
//!               Fault        ─▶ state = Failed, reject every pending entry
//! timer task:   sleep(timeout) ─▶ pending.remove(id) ─▶ reply Timeout
//! ```
//!
//! A response whose id is no longer pending (its timer already fired) is
//! dropped.
//!
//! The orchestrator must be created inside a tokio runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::audio::{AudioFormat, PreprocessOptions};
use crate::config::WorkerConfig;

use super::context::{AnalysisHandler, RequestHandler, WorkerContext};
use super::handlers::{self, HandlerError};
use super::protocol::{
    ChunkAnalysis, PreprocessResult, RequestId, SpectrumResult, WaveformResult, WorkerEvent,
    WorkerRequest, WorkerResponse,
};

// ---------------------------------------------------------------------------
// DispatchError
// ---------------------------------------------------------------------------

/// Why a call did not produce a result.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    /// The worker failed to start, has faulted, or is not ready yet.
    #[error("audio worker unavailable")]
    Unavailable,

    /// No response arrived in time.
    #[error("request {request_id} timed out after {timeout_ms} ms")]
    Timeout { request_id: RequestId, timeout_ms: u64 },

    /// The handler reported an error for this request.
    #[error("handler error: {0}")]
    Handler(String),

    /// The context faulted while this request was pending.
    #[error("worker context fault: {0}")]
    ContextFault(String),

    /// The orchestrator was torn down while this request was pending.
    #[error("audio worker terminated")]
    Terminated,

    /// The worker answered with a different operation than was asked.
    #[error("worker answered {0} with a mismatched response")]
    UnexpectedResponse(&'static str),
}

impl From<HandlerError> for DispatchError {
    fn from(e: HandlerError) -> Self {
        DispatchError::Handler(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// WorkerState / OrchestratorConfig
// ---------------------------------------------------------------------------

/// Lifecycle of the worker as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Spawned, `Ready` not yet received.  Calls run inline.
    Starting,
    /// Accepting requests.
    Ready,
    /// Failed to start or faulted.  Permanent for this orchestrator.
    Failed,
    /// Torn down by [`AudioOrchestrator::terminate`].
    Terminated,
}

/// Tuning for the dispatch policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Per-request deadline before falling back.
    pub timeout: Duration,
    /// Payloads smaller than this run inline.
    pub min_dispatch_bytes: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5_000),
            min_dispatch_bytes: 512,
        }
    }
}

impl From<&WorkerConfig> for OrchestratorConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            min_dispatch_bytes: config.min_dispatch_bytes,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state (orchestrator ↔ reader task ↔ timer tasks)
// ---------------------------------------------------------------------------

type Reply = oneshot::Sender<Result<WorkerResponse, DispatchError>>;

struct Pending {
    reply: Reply,
    timer: Option<JoinHandle<()>>,
}

impl Pending {
    fn settle(self, outcome: Result<WorkerResponse, DispatchError>) {
        if let Some(timer) = self.timer {
            timer.abort();
        }
        // The caller may have given up (future dropped); nothing to do then.
        let _ = self.reply.send(outcome);
    }
}

struct Shared {
    pending: Mutex<HashMap<RequestId, Pending>>,
    state: watch::Sender<WorkerState>,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, HashMap<RequestId, Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    fn mark_ready(&self) {
        let changed = self.state.send_if_modified(|state| {
            if *state == WorkerState::Starting {
                *state = WorkerState::Ready;
                true
            } else {
                false
            }
        });
        if changed {
            log::info!("audio worker ready");
        }
    }

    fn complete(&self, response: WorkerResponse) {
        let request_id = response.request_id();
        let entry = self.pending().remove(&request_id);
        match entry {
            Some(pending) => pending.settle(Ok(response)),
            None => log::debug!("dropping orphaned response for request {request_id}"),
        }
    }

    fn expire(&self, request_id: RequestId, timeout: Duration) {
        let entry = self.pending().remove(&request_id);
        if let Some(pending) = entry {
            log::warn!("request {request_id} timed out after {timeout:?}");
            // The timer being fired is this task; aborting it is harmless.
            pending.settle(Err(DispatchError::Timeout {
                request_id,
                timeout_ms: timeout.as_millis() as u64,
            }));
        }
    }

    /// Context fault: disable the worker and reject everything in flight.
    fn fail(&self, message: &str) {
        self.state.send_if_modified(|state| {
            if *state == WorkerState::Terminated || *state == WorkerState::Failed {
                false
            } else {
                *state = WorkerState::Failed;
                true
            }
        });
        log::error!("audio worker disabled: {message}");
        self.reject_all(|| DispatchError::ContextFault(message.to_string()));
    }

    fn reject_all(&self, error: impl Fn() -> DispatchError) {
        let drained: Vec<Pending> = self.pending().drain().map(|(_, p)| p).collect();
        for pending in drained {
            pending.settle(Err(error()));
        }
    }
}

async fn read_events(shared: Arc<Shared>, mut events: mpsc::UnboundedReceiver<WorkerEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            WorkerEvent::Ready => shared.mark_ready(),
            WorkerEvent::Response(response) => shared.complete(response),
            WorkerEvent::Fault(message) => {
                shared.fail(&message);
                return;
            }
        }
    }

    if shared.state() != WorkerState::Terminated {
        shared.fail("worker context exited unexpectedly");
    }
}

// ---------------------------------------------------------------------------
// AudioOrchestrator
// ---------------------------------------------------------------------------

/// Asynchronous front door to the analysis engines.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use live_meter::audio::AudioFormat;
/// use live_meter::worker::AudioOrchestrator;
///
/// # async fn example(pcm: Vec<u8>) {
/// let orchestrator = AudioOrchestrator::new(Default::default());
/// orchestrator.wait_ready(Duration::from_secs(1)).await;
///
/// let chunk = orchestrator
///     .process_audio_chunk(&pcm, AudioFormat::mono16(16_000), 28)
///     .await
///     .unwrap();
/// println!("{:.1} dB", chunk.rms_db);
/// // `pcm` is still ours: the worker received a copy.
/// # }
/// ```
pub struct AudioOrchestrator {
    shared: Arc<Shared>,
    context: Mutex<Option<WorkerContext>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
    config: OrchestratorConfig,
}

impl AudioOrchestrator {
    /// Spawn a worker running the production [`AnalysisHandler`].
    pub fn new(config: OrchestratorConfig) -> Self {
        Self::with_handler(config, AnalysisHandler)
    }

    /// Spawn a worker running `handler`.
    ///
    /// If the thread cannot be created the orchestrator starts in
    /// [`WorkerState::Failed`] and every call runs inline.
    pub fn with_handler<H: RequestHandler>(config: OrchestratorConfig, handler: H) -> Self {
        let (state, _) = watch::channel(WorkerState::Starting);
        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            state,
        });

        let (context, reader) = match WorkerContext::spawn(handler) {
            Ok((context, events)) => {
                let reader = tokio::spawn(read_events(Arc::clone(&shared), events));
                (Some(context), Some(reader))
            }
            Err(e) => {
                log::warn!("could not start audio worker ({e}); analysis will run inline");
                shared.state.send_replace(WorkerState::Failed);
                (None, None)
            }
        };

        Self {
            shared,
            context: Mutex::new(context),
            reader: Mutex::new(reader),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Current worker state.
    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    /// `true` once the worker is ready and until it fails or is terminated.
    pub fn is_available(&self) -> bool {
        self.state() == WorkerState::Ready
    }

    /// Number of requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.pending().len()
    }

    /// Dispatch tuning this orchestrator was built with.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Wait until the worker reports ready.
    ///
    /// Returns `false` if it fails, is terminated, or `timeout` elapses first.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        let mut rx = self.shared.state.subscribe();
        let wait = async move {
            loop {
                let state = *rx.borrow_and_update();
                match state {
                    WorkerState::Ready => return true,
                    WorkerState::Failed | WorkerState::Terminated => return false,
                    WorkerState::Starting => {}
                }
                if rx.changed().await.is_err() {
                    return false;
                }
            }
        };
        tokio::time::timeout(timeout, wait).await.unwrap_or(false)
    }

    /// Reject all pending requests, cancel their timers and stop the worker.
    ///
    /// Does not wait for the context thread.  Idempotent.
    pub fn terminate(&self) {
        let previous = self.shared.state.send_replace(WorkerState::Terminated);
        if previous == WorkerState::Terminated {
            return;
        }

        if let Some(reader) = lock(&self.reader).take() {
            reader.abort();
        }
        // Closing the request channel lets the thread exit on its own.
        lock(&self.context).take();

        self.shared.reject_all(|| DispatchError::Terminated);
        log::info!("audio worker terminated");
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Display bars plus whole-chunk RMS/peak/dB.
    pub async fn process_audio_chunk(
        &self,
        data: &[u8],
        format: AudioFormat,
        bar_count: usize,
    ) -> Result<ChunkAnalysis, DispatchError> {
        if self.should_dispatch(data.len()) {
            let payload = data.to_vec();
            let outcome = self
                .dispatch(|request_id| WorkerRequest::ProcessAudioChunk {
                    request_id,
                    data: payload,
                    format,
                    bar_count,
                })
                .await;
            match outcome {
                Ok(WorkerResponse::ProcessAudioChunk { result, .. }) => return Ok(result),
                Ok(_) => log::warn!("processAudioChunk: mismatched worker response"),
                Err(DispatchError::Terminated) => return Err(DispatchError::Terminated),
                Err(e) => self.note_fallback("processAudioChunk", &e),
            }
        }
        Ok(handlers::process_audio_chunk(data, &format, bar_count)?)
    }

    /// Display bars and per-bar peaks.
    pub async fn generate_waveform(
        &self,
        data: &[u8],
        format: AudioFormat,
        bar_count: usize,
    ) -> Result<WaveformResult, DispatchError> {
        if self.should_dispatch(data.len()) {
            let payload = data.to_vec();
            let outcome = self
                .dispatch(|request_id| WorkerRequest::GenerateWaveform {
                    request_id,
                    data: payload,
                    format,
                    bar_count,
                })
                .await;
            match outcome {
                Ok(WorkerResponse::GenerateWaveform { result, .. }) => return Ok(result),
                Ok(_) => log::warn!("generateWaveform: mismatched worker response"),
                Err(DispatchError::Terminated) => return Err(DispatchError::Terminated),
                Err(e) => self.note_fallback("generateWaveform", &e),
            }
        }
        Ok(handlers::generate_waveform(data, &format, bar_count)?)
    }

    /// Log-band spectrum.  Worker only; see the module docs for the
    /// zero-valued result.
    pub async fn compute_fft(
        &self,
        data: &[u8],
        format: AudioFormat,
        fft_size: usize,
        frequency_bins: usize,
    ) -> Result<SpectrumResult, DispatchError> {
        if !self.is_available() {
            log::debug!("computeFFT: worker unavailable, returning empty spectrum");
            return Ok(SpectrumResult::zeroed(frequency_bins));
        }

        let payload = data.to_vec();
        let outcome = self
            .dispatch(|request_id| WorkerRequest::ComputeFft {
                request_id,
                data: payload,
                format,
                fft_size,
                frequency_bins,
            })
            .await;

        match outcome {
            Ok(WorkerResponse::ComputeFft { result, .. }) => Ok(result),
            Ok(_) => Err(DispatchError::UnexpectedResponse("computeFFT")),
            Err(e @ (DispatchError::Timeout { .. } | DispatchError::Unavailable)) => {
                log::warn!("computeFFT: {e}; returning empty spectrum");
                Ok(SpectrumResult::zeroed(frequency_bins))
            }
            Err(e) => Err(e),
        }
    }

    /// DC removal and optional normalisation.
    pub async fn preprocess_chunk(
        &self,
        data: &[u8],
        format: AudioFormat,
        options: PreprocessOptions,
    ) -> Result<PreprocessResult, DispatchError> {
        if self.should_dispatch(data.len()) {
            let payload = data.to_vec();
            let outcome = self
                .dispatch(|request_id| WorkerRequest::PreprocessChunk {
                    request_id,
                    data: payload,
                    format,
                    options,
                })
                .await;
            match outcome {
                Ok(WorkerResponse::PreprocessChunk { result, .. }) => return Ok(result),
                Ok(_) => log::warn!("preprocessChunk: mismatched worker response"),
                Err(DispatchError::Terminated) => return Err(DispatchError::Terminated),
                Err(e) => self.note_fallback("preprocessChunk", &e),
            }
        }
        Ok(handlers::preprocess_chunk(data, &format, options)?)
    }

    // -----------------------------------------------------------------------
    // Dispatch plumbing
    // -----------------------------------------------------------------------

    fn should_dispatch(&self, payload_len: usize) -> bool {
        if !self.is_available() {
            log::debug!("worker {:?}; computing inline", self.state());
            return false;
        }
        if payload_len < self.config.min_dispatch_bytes {
            log::debug!("payload of {payload_len} bytes below dispatch threshold; inline");
            return false;
        }
        true
    }

    fn note_fallback(&self, operation: &str, error: &DispatchError) {
        log::warn!("{operation}: worker path failed ({error}); computing inline");
    }

    /// Send one request and wait for its correlated response.
    ///
    /// Fails fast with [`DispatchError::Unavailable`] unless the worker is
    /// ready.  A handler `Error` response is turned into
    /// [`DispatchError::Handler`].
    async fn dispatch(
        &self,
        build: impl FnOnce(RequestId) -> WorkerRequest,
    ) -> Result<WorkerResponse, DispatchError> {
        if !self.is_available() {
            return Err(DispatchError::Unavailable);
        }

        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = build(request_id);
        let (reply, response) = oneshot::channel();

        self.shared.pending().insert(request_id, Pending { reply, timer: None });

        let timeout = self.config.timeout;
        let shared = Arc::clone(&self.shared);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            shared.expire(request_id, timeout);
        });
        match self.shared.pending().get_mut(&request_id) {
            Some(entry) => entry.timer = Some(timer),
            None => timer.abort(),
        }

        log::debug!("dispatching {} #{request_id}", request.label());
        let sent = match lock(&self.context).as_ref() {
            Some(context) => context.send(request).is_ok(),
            None => false,
        };
        if !sent {
            let entry = self.shared.pending().remove(&request_id);
            if let Some(pending) = entry {
                if let Some(timer) = pending.timer {
                    timer.abort();
                }
            }
            if self.state() == WorkerState::Terminated {
                return Err(DispatchError::Terminated);
            }
            self.shared.fail("request channel closed");
            return Err(DispatchError::Unavailable);
        }

        match response.await {
            Ok(Ok(WorkerResponse::Error { message, .. })) => Err(DispatchError::Handler(message)),
            Ok(outcome) => outcome,
            // Reply sender dropped without settling: only happens on teardown.
            Err(_) => Err(DispatchError::Terminated),
        }
    }
}

impl Drop for AudioOrchestrator {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
