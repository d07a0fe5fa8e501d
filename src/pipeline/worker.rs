//! Worker tasks
//!
//! Each worker owns a bounded request channel and runs the record transform
//! on every request it receives, reporting a [`WorkerOutcome`] back to the
//! results task. The transform call is wrapped in `catch_unwind` so a panic
//! takes down one request, not the pool.

use crate::domain::{AnonymizationError, AnonymizedData, EntityRecord, ProcessingRequest};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// The per-record transform run by workers, fixed at pool startup
pub type ProcessFn =
    Arc<dyn Fn(&EntityRecord) -> Result<AnonymizedData, AnonymizationError> + Send + Sync>;

/// An engine failure as seen by the results task
#[derive(Debug)]
pub struct WorkerError {
    pub reason: String,
    /// Deterministic rejections (invalid record, strict compliance) are not
    /// worth retrying; transient failures are
    pub retryable: bool,
}

impl From<AnonymizationError> for WorkerError {
    fn from(err: AnonymizationError) -> Self {
        let retryable = !matches!(
            err,
            AnonymizationError::InvalidRecord(_) | AnonymizationError::ComplianceRejected { .. }
        );
        Self {
            reason: err.to_string(),
            retryable,
        }
    }
}

/// What happened to one request on a worker
#[derive(Debug)]
pub enum WorkerOutcome {
    /// The engine ran to completion, successfully or not
    Finished {
        request: ProcessingRequest,
        result: Result<AnonymizedData, WorkerError>,
        elapsed_ms: u64,
    },
    /// The engine panicked on this request
    Panicked {
        worker_id: usize,
        request: ProcessingRequest,
        reason: String,
    },
}

/// Spawn one worker task
///
/// The worker exits when its request channel closes or, with
/// `restart_on_error` disabled, after the first panic. On shutdown it first
/// finishes any requests already buffered in its channel.
pub fn spawn_worker(
    worker_id: usize,
    process: ProcessFn,
    mut requests: mpsc::Receiver<ProcessingRequest>,
    outcomes: mpsc::UnboundedSender<WorkerOutcome>,
    mut shutdown: watch::Receiver<bool>,
    restart_on_error: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(worker_id, "worker started");
        loop {
            let request = tokio::select! {
                _ = shutdown.changed() => break,
                maybe = requests.recv() => match maybe {
                    Some(request) => request,
                    None => break,
                },
            };
            if !handle_request(worker_id, &process, request, &outcomes, restart_on_error) {
                debug!(worker_id, "worker stopped");
                return;
            }
        }

        // Shutdown closed the dispatch side; drain what is already buffered
        // so fire-and-forget submissions are not dropped.
        while let Ok(request) = requests.try_recv() {
            if !handle_request(worker_id, &process, request, &outcomes, restart_on_error) {
                break;
            }
        }
        debug!(worker_id, "worker stopped");
    })
}

/// Run one request through the transform and report the outcome
///
/// Returns `false` when the worker should exit.
fn handle_request(
    worker_id: usize,
    process: &ProcessFn,
    request: ProcessingRequest,
    outcomes: &mpsc::UnboundedSender<WorkerOutcome>,
    restart_on_error: bool,
) -> bool {
    let start = Instant::now();
    let outcome =
        match std::panic::catch_unwind(AssertUnwindSafe(|| process(&request.record))) {
            Ok(result) => WorkerOutcome::Finished {
                request,
                result: result.map_err(WorkerError::from),
                elapsed_ms: start.elapsed().as_millis() as u64,
            },
            Err(panic) => {
                let reason = panic_message(&panic);
                error!(worker_id, reason, "worker panicked on request");
                WorkerOutcome::Panicked {
                    worker_id,
                    request,
                    reason,
                }
            }
        };

    let panicked = matches!(outcome, WorkerOutcome::Panicked { .. });
    if outcomes.send(outcome).is_err() {
        // Results task is gone; the pipeline is shutting down.
        return false;
    }
    !(panicked && !restart_on_error)
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::AnonymizationEngine;
    use crate::config::MantleConfig;
    use crate::domain::record::EventRecord;

    fn engine_process() -> ProcessFn {
        let engine =
            Arc::new(AnonymizationEngine::new(Arc::new(MantleConfig::for_tests())).unwrap());
        Arc::new(move |record| engine.anonymize(record))
    }

    fn event_request(id: &str) -> ProcessingRequest {
        ProcessingRequest::new(EntityRecord::Event(EventRecord {
            id: id.to_string(),
            user_id: Some("u1".to_string()),
            session_id: None,
            event_type: "login".to_string(),
            properties: Default::default(),
            device: None,
            browser: None,
            occurred_at: None,
        }))
    }

    #[tokio::test]
    async fn test_worker_processes_and_reports() {
        let (req_tx, req_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_worker(0, engine_process(), req_rx, out_tx, shutdown_rx, true);

        let request = event_request("ev-1");
        let request_id = request.id;
        req_tx.send(request).await.unwrap();

        match out_rx.recv().await.unwrap() {
            WorkerOutcome::Finished {
                request, result, ..
            } => {
                assert_eq!(request.id, request_id);
                assert!(result.is_ok());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        drop(req_tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_reports_engine_errors() {
        let (req_tx, req_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_worker(0, engine_process(), req_rx, out_tx, shutdown_rx, true);

        // Empty id is rejected by the engine
        req_tx.send(event_request("")).await.unwrap();
        match out_rx.recv().await.unwrap() {
            WorkerOutcome::Finished { result, .. } => {
                let err = result.unwrap_err();
                assert!(err.reason.contains("empty id"));
                assert!(!err.retryable);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        drop(req_tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_stops_on_shutdown() {
        let (_req_tx, req_rx) = mpsc::channel::<ProcessingRequest>(8);
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_worker(0, engine_process(), req_rx, out_tx, shutdown_rx, true);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_survives_panic_with_restart_enabled() {
        let process: ProcessFn = Arc::new(|_| panic!("transform blew up"));
        let (req_tx, req_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_worker(0, process, req_rx, out_tx, shutdown_rx, true);

        req_tx.send(event_request("ev-1")).await.unwrap();
        assert!(matches!(
            out_rx.recv().await.unwrap(),
            WorkerOutcome::Panicked { worker_id: 0, .. }
        ));

        // Still alive for the next request
        req_tx.send(event_request("ev-2")).await.unwrap();
        assert!(matches!(
            out_rx.recv().await.unwrap(),
            WorkerOutcome::Panicked { .. }
        ));

        drop(req_tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_degrades_on_panic_with_restart_disabled() {
        let process: ProcessFn = Arc::new(|_| panic!("transform blew up"));
        let (req_tx, req_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_worker(0, process, req_rx, out_tx, shutdown_rx, false);

        req_tx.send(event_request("ev-1")).await.unwrap();
        assert!(matches!(
            out_rx.recv().await.unwrap(),
            WorkerOutcome::Panicked { .. }
        ));

        // The worker exits after the panic even though the channel is open
        handle.await.unwrap();
    }
}
