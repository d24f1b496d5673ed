//! Background compression worker.
//!
//! A [`Worker`] owns one dedicated thread. Requests go in through a bounded
//! queue; results come back on a separate channel, each carrying the `id` of
//! the request it answers. Requests are handled strictly one at a time, in
//! submission order, so results also arrive in submission order.
//!
//! ```text
//!            submit / try_submit                  recv / try_recv
//! caller ─────────────────────────▶ [ worker ] ─────────────────────▶ caller
//!          sync_channel(queue_depth)    │         channel (unbounded)
//!                                       ▼
//!                Idle → Decoding → Searching → Responding → Idle
//! ```
//!
//! Every request gets exactly one result. Decode failures, invalid options
//! and even panics inside the pipeline come back as
//! [`CompressionResult::Failure`]; the worker keeps serving afterwards.

use crate::compress::{CompressError, Compressor, into_result};
use crate::types::{CompressedImage, CompressionRequest, CompressionResult};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info_span, trace};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("worker has shut down")]
    Closed,
    #[error("worker queue is full")]
    Full(Box<CompressionRequest>),
    #[error("timed out waiting for a result")]
    Timeout,
    #[error("worker thread panicked")]
    Panicked,
}

/// What the worker thread is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Decoding,
    Searching,
    Responding,
}

impl Phase {
    /// Whether `next` may follow `self`.
    ///
    /// Any busy phase may jump straight to `Responding` (a failed decode
    /// never reaches `Searching`).
    pub fn can_transition_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Idle, Phase::Decoding)
                | (Phase::Decoding, Phase::Searching)
                | (Phase::Decoding, Phase::Responding)
                | (Phase::Searching, Phase::Responding)
                | (Phase::Responding, Phase::Idle)
        )
    }
}

fn enter(phase: &mut Phase, next: Phase) {
    debug_assert!(
        phase.can_transition_to(next),
        "invalid transition {phase:?} → {next:?}"
    );
    trace!(from = ?*phase, to = ?next, "phase");
    *phase = next;
}

/// Handle to the worker thread.
///
/// Dropping the handle closes the queue; requests already queued are still
/// processed, but their results are discarded. Use [`Worker::shutdown`] to
/// wait for them.
pub struct Worker {
    requests: Option<SyncSender<CompressionRequest>>,
    results: Receiver<CompressionResult>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start the worker thread with at most `queue_depth` pending requests.
    pub fn spawn(compressor: Compressor, queue_depth: usize) -> Result<Self, WorkerError> {
        let (request_tx, request_rx) = mpsc::sync_channel(queue_depth.max(1));
        let (result_tx, result_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("snug-worker".into())
            .spawn(move || run(compressor, request_rx, result_tx))?;

        Ok(Self {
            requests: Some(request_tx),
            results: result_rx,
            handle: Some(handle),
        })
    }

    fn sender(&self) -> Result<&SyncSender<CompressionRequest>, WorkerError> {
        self.requests.as_ref().ok_or(WorkerError::Closed)
    }

    /// Queue a request, blocking while the queue is full.
    pub fn submit(&self, request: CompressionRequest) -> Result<(), WorkerError> {
        self.sender()?
            .send(request)
            .map_err(|_| WorkerError::Closed)
    }

    /// Queue a request without blocking. A full queue hands the request back.
    pub fn try_submit(&self, request: CompressionRequest) -> Result<(), WorkerError> {
        self.sender()?.try_send(request).map_err(|e| match e {
            TrySendError::Full(request) => WorkerError::Full(Box::new(request)),
            TrySendError::Disconnected(_) => WorkerError::Closed,
        })
    }

    /// Wait for the next result.
    pub fn recv(&self) -> Result<CompressionResult, WorkerError> {
        self.results.recv().map_err(|_| WorkerError::Closed)
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<CompressionResult, WorkerError> {
        self.results.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => WorkerError::Timeout,
            RecvTimeoutError::Disconnected => WorkerError::Closed,
        })
    }

    /// Next result if one is ready.
    pub fn try_recv(&self) -> Option<CompressionResult> {
        self.results.try_recv().ok()
    }

    /// Close the queue, let the worker finish what is queued, and return
    /// every result not yet received.
    pub fn shutdown(mut self) -> Result<Vec<CompressionResult>, WorkerError> {
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| WorkerError::Panicked)?;
        }
        Ok(self.results.try_iter().collect())
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.requests.take();
    }
}

fn run(
    compressor: Compressor,
    requests: Receiver<CompressionRequest>,
    results: Sender<CompressionResult>,
) {
    let mut phase = Phase::Idle;
    debug!("worker started");

    for request in requests {
        let result = serve(&request, &mut phase, |request, phase| {
            let (surface, options) = compressor.prepare(request)?;
            enter(phase, Phase::Searching);
            compressor.search(&surface, &options)
        });

        if results.send(result).is_err() {
            debug!("result receiver dropped, stopping");
            break;
        }
        enter(&mut phase, Phase::Idle);
    }

    debug!("worker stopped");
}

/// Run one request through `pipeline`, catching panics, and leave the
/// worker in [`Phase::Responding`].
fn serve<F>(request: &CompressionRequest, phase: &mut Phase, pipeline: F) -> CompressionResult
where
    F: FnOnce(&CompressionRequest, &mut Phase) -> Result<CompressedImage, CompressError>,
{
    let span = info_span!("request", id = %request.id);
    let _guard = span.enter();

    enter(phase, Phase::Decoding);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| pipeline(request, &mut *phase)));

    let result = match outcome {
        Ok(outcome) => into_result(request.id.clone(), outcome),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(panic = %message, "compression panicked");
            CompressionResult::Failure {
                id: request.id.clone(),
                error: format!("internal error: {message}"),
            }
        }
    };

    // A panic can leave the phase anywhere between Decoding and Searching
    if *phase != Phase::Responding {
        enter(phase, Phase::Responding);
    }
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompressOptions, EncoderConfig};
    use crate::imaging::Resample;
    use crate::test_helpers::{encode_jpeg, gradient_rgb, jpeg_request};

    fn worker() -> Worker {
        let compressor = Compressor::new(
            CompressOptions::default(),
            EncoderConfig {
                resample: Resample::Triangle,
                ..EncoderConfig::default()
            },
        );
        Worker::spawn(compressor, 4).unwrap()
    }

    #[test]
    fn phase_transitions() {
        assert!(Phase::Idle.can_transition_to(Phase::Decoding));
        assert!(Phase::Decoding.can_transition_to(Phase::Searching));
        assert!(Phase::Decoding.can_transition_to(Phase::Responding));
        assert!(Phase::Searching.can_transition_to(Phase::Responding));
        assert!(Phase::Responding.can_transition_to(Phase::Idle));

        assert!(!Phase::Idle.can_transition_to(Phase::Searching));
        assert!(!Phase::Searching.can_transition_to(Phase::Decoding));
        assert!(!Phase::Responding.can_transition_to(Phase::Decoding));
    }

    #[test]
    fn result_carries_request_id() {
        let worker = worker();
        worker
            .submit(jpeg_request("img-1", encode_jpeg(&gradient_rgb(40, 30))))
            .unwrap();

        let result = worker.recv().unwrap();
        assert_eq!(result.id(), "img-1");
        let blob = result.into_result().unwrap();
        assert_eq!((blob.width, blob.height), (40, 30));
    }

    #[test]
    fn garbage_input_gets_error_response() {
        let worker = worker();
        worker
            .submit(jpeg_request("junk", b"not an image".to_vec()))
            .unwrap();

        match worker.recv().unwrap() {
            CompressionResult::Failure { id, error } => {
                assert_eq!(id, "junk");
                assert!(!error.is_empty());
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn results_follow_submission_order() {
        let worker = worker();
        let ids = ["a", "b", "c", "d"];
        for (i, id) in ids.iter().enumerate() {
            let bytes = if i == 1 {
                b"broken".to_vec()
            } else {
                encode_jpeg(&gradient_rgb(30 + i as u32, 20))
            };
            worker.submit(jpeg_request(id, bytes)).unwrap();
        }

        let received: Vec<String> = (0..ids.len())
            .map(|_| worker.recv().unwrap().id().to_string())
            .collect();
        assert_eq!(received, ids);
    }

    #[test]
    fn worker_survives_failures() {
        let worker = worker();
        worker.submit(jpeg_request("bad", Vec::new())).unwrap();
        worker
            .submit(jpeg_request("good", encode_jpeg(&gradient_rgb(16, 16))))
            .unwrap();

        assert!(!worker.recv().unwrap().is_success());
        assert!(worker.recv().unwrap().is_success());
    }

    #[test]
    fn shutdown_drains_queued_requests() {
        let worker = worker();
        worker
            .submit(jpeg_request("x", encode_jpeg(&gradient_rgb(12, 12))))
            .unwrap();
        worker
            .submit(jpeg_request("y", encode_jpeg(&gradient_rgb(12, 12))))
            .unwrap();

        let results = worker.shutdown().unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.id()).collect();
        assert_eq!(ids, ["x", "y"]);
    }

    #[test]
    fn idle_worker_times_out() {
        let worker = worker();
        assert!(worker.try_recv().is_none());
        assert!(matches!(
            worker.recv_timeout(Duration::from_millis(20)),
            Err(WorkerError::Timeout)
        ));
    }

    #[test]
    fn panic_becomes_failure() {
        let request = jpeg_request("boom", Vec::new());
        let mut phase = Phase::Idle;
        let result = serve(&request, &mut phase, |_, phase| {
            enter(phase, Phase::Searching);
            panic!("encoder exploded");
        });

        assert_eq!(phase, Phase::Responding);
        match result {
            CompressionResult::Failure { id, error } => {
                assert_eq!(id, "boom");
                assert!(error.contains("encoder exploded"), "{error}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn serve_ends_in_responding_phase() {
        let request = jpeg_request("ok", encode_jpeg(&gradient_rgb(8, 8)));
        let compressor = Compressor::default();
        let mut phase = Phase::Idle;
        let result = serve(&request, &mut phase, |request, _| compressor.compress(request));

        assert!(result.is_success());
        assert_eq!(phase, Phase::Responding);
    }
}
