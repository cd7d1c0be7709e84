//! The background execution context: one dedicated OS thread that owns a
//! [`RequestHandler`] and processes requests strictly one at a time.
//!
//! # Lifecycle
//!
//! ```text
//! spawn ──▶ emits Ready ──▶ recv request ─▶ handle ─▶ emit Response ─┐
//!                              ▲                                     │
//!                              └─────────────────────────────────────┘
//! request channel closed ──▶ thread exits quietly
//! HandlerError::Fatal    ──▶ emits Fault, thread exits
//! ```
//!
//! A panic inside a handler is caught and reported as a correlated
//! [`WorkerResponse::Error`]; the loop keeps running.  If the thread dies in
//! any other way its event sender is dropped, which the reader on the other
//! side observes as a closed channel.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::JoinHandle;

use tokio::sync::mpsc;

use super::handlers::{self, HandlerError};
use super::protocol::{WorkerEvent, WorkerRequest, WorkerResponse};

// ---------------------------------------------------------------------------
// RequestHandler
// ---------------------------------------------------------------------------

/// Code run inside the context for each request.
///
/// Takes the request by value: the PCM payload belongs to the handler from
/// here on.
pub trait RequestHandler: Send + 'static {
    fn handle(&mut self, request: WorkerRequest) -> Result<WorkerResponse, HandlerError>;
}

/// Production handler running the audio engines.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnalysisHandler;

impl RequestHandler for AnalysisHandler {
    fn handle(&mut self, request: WorkerRequest) -> Result<WorkerResponse, HandlerError> {
        handlers::handle(request)
    }
}

// ---------------------------------------------------------------------------
// WorkerContext
// ---------------------------------------------------------------------------

/// Handle to a running context thread.
///
/// Dropping the handle closes the request channel; the thread finishes the
/// message it is on and exits.  Nobody waits for it.
pub struct WorkerContext {
    requests: mpsc::UnboundedSender<WorkerRequest>,
    _thread: JoinHandle<()>,
}

impl WorkerContext {
    /// Start the context thread.
    ///
    /// Returns the handle and the receiving end of the event channel.  The
    /// first event is always [`WorkerEvent::Ready`].
    pub fn spawn<H: RequestHandler>(
        handler: H,
    ) -> std::io::Result<(Self, mpsc::UnboundedReceiver<WorkerEvent>)> {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let thread = std::thread::Builder::new()
            .name("audio-worker".into())
            .spawn(move || run(handler, request_rx, event_tx))?;

        Ok((
            Self {
                requests: request_tx,
                _thread: thread,
            },
            event_rx,
        ))
    }

    /// Queue `request`.  Hands the request back if the thread has exited.
    pub fn send(&self, request: WorkerRequest) -> Result<(), WorkerRequest> {
        self.requests.send(request).map_err(|e| e.0)
    }
}

fn run<H: RequestHandler>(
    mut handler: H,
    mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
    events: mpsc::UnboundedSender<WorkerEvent>,
) {
    log::debug!("audio-worker: started");
    if events.send(WorkerEvent::Ready).is_err() {
        return;
    }

    while let Some(request) = requests.blocking_recv() {
        let request_id = request.request_id();
        let label = request.label();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(request)))
            .unwrap_or_else(|payload| Err(HandlerError::Panicked(panic_message(payload))));

        let event = match outcome {
            Ok(response) => WorkerEvent::Response(response),
            Err(HandlerError::Fatal(message)) => {
                log::error!("audio-worker: fatal fault in {label} #{request_id}: {message}");
                let _ = events.send(WorkerEvent::Fault(message));
                return;
            }
            Err(e) => {
                log::warn!("audio-worker: {label} #{request_id} failed: {e}");
                WorkerEvent::Response(WorkerResponse::Error {
                    request_id,
                    message: e.to_string(),
                })
            }
        };

        if events.send(event).is_err() {
            // Orchestrator is gone.
            break;
        }
    }

    log::debug!("audio-worker: request channel closed, exiting");
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFormat;

    fn chunk_request(request_id: u64) -> WorkerRequest {
        WorkerRequest::ProcessAudioChunk {
            request_id,
            data: vec![0; 1_024],
            format: AudioFormat::default(),
            bar_count: 28,
        }
    }

    struct PanicOnOdd;

    impl RequestHandler for PanicOnOdd {
        fn handle(&mut self, request: WorkerRequest) -> Result<WorkerResponse, HandlerError> {
            if request.request_id() % 2 == 1 {
                panic!("odd request");
            }
            handlers::handle(request)
        }
    }

    struct AlwaysFatal;

    impl RequestHandler for AlwaysFatal {
        fn handle(&mut self, _request: WorkerRequest) -> Result<WorkerResponse, HandlerError> {
            Err(HandlerError::Fatal("device lost".into()))
        }
    }

    #[test]
    fn emits_ready_before_anything_else() {
        let (_ctx, mut events) = WorkerContext::spawn(AnalysisHandler).unwrap();
        assert!(matches!(events.blocking_recv(), Some(WorkerEvent::Ready)));
    }

    #[test]
    fn responses_carry_request_id() {
        let (ctx, mut events) = WorkerContext::spawn(AnalysisHandler).unwrap();
        assert!(matches!(events.blocking_recv(), Some(WorkerEvent::Ready)));

        ctx.send(chunk_request(11)).unwrap();
        ctx.send(chunk_request(12)).unwrap();

        let mut ids = Vec::new();
        for _ in 0..2 {
            match events.blocking_recv() {
                Some(WorkerEvent::Response(WorkerResponse::ProcessAudioChunk {
                    request_id,
                    result,
                })) => {
                    assert_eq!(result.bars.len(), 28);
                    ids.push(request_id);
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
        ids.sort_unstable();
        assert_eq!(ids, vec![11, 12]);
    }

    #[test]
    fn handler_panic_becomes_error_response_and_context_survives() {
        let (ctx, mut events) = WorkerContext::spawn(PanicOnOdd).unwrap();
        assert!(matches!(events.blocking_recv(), Some(WorkerEvent::Ready)));

        ctx.send(chunk_request(1)).unwrap();
        match events.blocking_recv() {
            Some(WorkerEvent::Response(WorkerResponse::Error { request_id, message })) => {
                assert_eq!(request_id, 1);
                assert!(message.contains("odd request"), "message: {message}");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        ctx.send(chunk_request(2)).unwrap();
        assert!(matches!(
            events.blocking_recv(),
            Some(WorkerEvent::Response(WorkerResponse::ProcessAudioChunk { request_id: 2, .. }))
        ));
    }

    #[test]
    fn fatal_error_emits_fault_and_stops() {
        let (ctx, mut events) = WorkerContext::spawn(AlwaysFatal).unwrap();
        assert!(matches!(events.blocking_recv(), Some(WorkerEvent::Ready)));

        ctx.send(chunk_request(3)).unwrap();
        match events.blocking_recv() {
            Some(WorkerEvent::Fault(message)) => assert_eq!(message, "device lost"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(events.blocking_recv().is_none());
    }

    #[test]
    fn dropping_handle_stops_thread() {
        let (ctx, mut events) = WorkerContext::spawn(AnalysisHandler).unwrap();
        assert!(matches!(events.blocking_recv(), Some(WorkerEvent::Ready)));
        drop(ctx);
        assert!(events.blocking_recv().is_none());
    }
}
