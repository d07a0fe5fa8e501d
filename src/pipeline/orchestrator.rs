//! Pipeline orchestrator
//!
//! Owns the worker pool, the input queue, the output buffer, and the retry
//! and quarantine policy. The lifecycle is a small state machine:
//!
//! ```text
//! Stopped -> Starting -> Running <-> Paused
//!                           |
//!                        Stopping -> Stopped
//! ```
//!
//! Requests enter through [`Pipeline::process_data`] (await the result) or
//! [`Pipeline::submit`] (fire and forget). A dispatch task moves queued
//! requests onto per-worker channels; a results task settles each outcome,
//! scheduling exponential-backoff retries and quarantining requests that
//! exhaust them; flushes group the output buffer by entity kind and hand the
//! batches to the storage writer.

use crate::adapters::{QuarantineSink, StorageWriter};
use crate::anonymization::AnonymizationEngine;
use crate::config::MantleConfig;
use crate::domain::{
    AnonymizedData, EntityKind, EntityRecord, PipelineError, ProcessingMetrics, ProcessingRequest,
};
use crate::pipeline::events::{PipelineEvent, EVENT_CHANNEL_CAPACITY};
use crate::pipeline::metrics::{process_rss_bytes, MetricsRecorder};
use crate::pipeline::worker::{spawn_worker, ProcessFn, WorkerOutcome};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Pipeline lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Stopped,
    Starting,
    Running,
    Paused,
    Stopping,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
        };
        write!(f, "{s}")
    }
}

/// A point-in-time status report
#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineStatus {
    pub state: String,
    pub worker_count: usize,
    pub queue_depth: usize,
    pub metrics: ProcessingMetrics,
}

type CompletionSender = oneshot::Sender<Result<AnonymizedData, PipelineError>>;

/// State shared between the pipeline handle and its background tasks
struct Shared {
    config: Arc<MantleConfig>,
    storage: Arc<dyn StorageWriter>,
    quarantine: Arc<dyn QuarantineSink>,
    state: RwLock<PipelineState>,
    input: Mutex<VecDeque<ProcessingRequest>>,
    output: Mutex<Vec<AnonymizedData>>,
    pending: Mutex<HashMap<Uuid, CompletionSender>>,
    /// Requests handed to a worker that have not settled or returned to the
    /// input queue yet; covers backoff-scheduled retries, which are otherwise
    /// invisible to the stop() drain
    in_flight: AtomicUsize,
    metrics: MetricsRecorder,
    events: broadcast::Sender<PipelineEvent>,
    /// Wakes the dispatch task when work arrives
    wakeup: Notify,
}

impl Shared {
    fn state(&self) -> PipelineState {
        self.state.read().map(|s| *s).unwrap_or(PipelineState::Stopped)
    }

    fn set_state(&self, next: PipelineState) {
        if let Ok(mut state) = self.state.write() {
            info!(from = %*state, to = %next, "pipeline state change");
            *state = next;
        }
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine; events are advisory.
        let _ = self.events.send(event);
    }

    fn queue_depth(&self) -> usize {
        self.input.lock().map(|q| q.len()).unwrap_or(0)
    }

    fn output_buffered(&self) -> usize {
        self.output.lock().map(|o| o.len()).unwrap_or(0)
    }

    fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    fn resolve(&self, request_id: Uuid, result: Result<AnonymizedData, PipelineError>) {
        let sender = self
            .pending
            .lock()
            .ok()
            .and_then(|mut pending| pending.remove(&request_id));
        if let Some(sender) = sender {
            // The caller may have timed out and dropped its receiver.
            let _ = sender.send(result);
        }
    }
}

/// Handles owned only while the pipeline is running
struct RunningTasks {
    shutdown: watch::Sender<bool>,
    worker_txs: Vec<mpsc::Sender<ProcessingRequest>>,
    tasks: Vec<JoinHandle<()>>,
}

/// The pipeline orchestrator
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct Pipeline {
    shared: Arc<Shared>,
    process: ProcessFn,
    running: tokio::sync::Mutex<Option<RunningTasks>>,
}

impl Pipeline {
    pub fn new(
        config: Arc<MantleConfig>,
        engine: Arc<AnonymizationEngine>,
        storage: Arc<dyn StorageWriter>,
        quarantine: Arc<dyn QuarantineSink>,
    ) -> Self {
        let process: ProcessFn = Arc::new(move |record| engine.anonymize(record));
        Self::with_process(config, process, storage, quarantine)
    }

    /// The same pipeline over an arbitrary record transform
    fn with_process(
        config: Arc<MantleConfig>,
        process: ProcessFn,
        storage: Arc<dyn StorageWriter>,
        quarantine: Arc<dyn QuarantineSink>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                config,
                storage,
                quarantine,
                state: RwLock::new(PipelineState::Stopped),
                input: Mutex::new(VecDeque::new()),
                output: Mutex::new(Vec::new()),
                pending: Mutex::new(HashMap::new()),
                in_flight: AtomicUsize::new(0),
                metrics: MetricsRecorder::new(),
                events,
                wakeup: Notify::new(),
            }),
            process,
            running: tokio::sync::Mutex::new(None),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        self.shared.state()
    }

    /// Subscribe to the pipeline event stream
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.shared.events.subscribe()
    }

    /// A point-in-time metrics snapshot
    pub fn metrics(&self) -> ProcessingMetrics {
        self.shared
            .metrics
            .set_depths(self.shared.queue_depth(), self.shared.output_buffered());
        self.shared.metrics.set_memory(process_rss_bytes());
        self.shared.metrics.snapshot()
    }

    /// Current state, pool size, and metrics in one report
    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            state: self.shared.state().to_string(),
            worker_count: self.shared.config.pipeline.worker_count,
            queue_depth: self.shared.queue_depth(),
            metrics: self.metrics(),
        }
    }

    /// Start the worker pool and background tasks
    pub async fn start(&self) -> Result<(), PipelineError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(PipelineError::AlreadyRunning);
        }
        self.shared.set_state(PipelineState::Starting);

        let pipeline_cfg = &self.shared.config.pipeline;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        let mut worker_txs = Vec::with_capacity(pipeline_cfg.worker_count);
        let mut tasks = Vec::new();
        for worker_id in 0..pipeline_cfg.worker_count {
            let (req_tx, req_rx) = mpsc::channel(pipeline_cfg.batch_size);
            worker_txs.push(req_tx);
            tasks.push(spawn_worker(
                worker_id,
                Arc::clone(&self.process),
                req_rx,
                outcome_tx.clone(),
                shutdown_rx.clone(),
                pipeline_cfg.restart_on_error,
            ));
        }
        // Workers hold the only remaining senders; the results task exits
        // once every worker is gone.
        drop(outcome_tx);

        tasks.push(tokio::spawn(results_loop(
            Arc::clone(&self.shared),
            outcome_rx,
        )));
        tasks.push(tokio::spawn(dispatch_loop(
            Arc::clone(&self.shared),
            worker_txs.clone(),
            shutdown_rx.clone(),
        )));
        tasks.push(tokio::spawn(metrics_loop(
            Arc::clone(&self.shared),
            shutdown_rx,
        )));

        *running = Some(RunningTasks {
            shutdown: shutdown_tx,
            worker_txs,
            tasks,
        });
        self.shared.set_state(PipelineState::Running);
        info!(
            workers = pipeline_cfg.worker_count,
            batch_size = pipeline_cfg.batch_size,
            "pipeline started"
        );
        Ok(())
    }

    /// Stop accepting dispatches without shutting the pool down
    pub fn pause(&self) -> Result<(), PipelineError> {
        match self.shared.state() {
            PipelineState::Running => {
                self.shared.set_state(PipelineState::Paused);
                Ok(())
            }
            other => Err(PipelineError::NotRunning(other.to_string())),
        }
    }

    /// Resume dispatching after a pause
    pub fn resume(&self) -> Result<(), PipelineError> {
        match self.shared.state() {
            PipelineState::Paused => {
                self.shared.set_state(PipelineState::Running);
                self.shared.wakeup.notify_one();
                Ok(())
            }
            other => Err(PipelineError::NotRunning(other.to_string())),
        }
    }

    /// Anonymize one record through the pipeline and await the result
    ///
    /// Accepted while Running or Paused (paused requests queue up). The call
    /// fails with [`PipelineError::Timeout`] if the result does not arrive
    /// within `pipeline.timeout_ms`.
    pub async fn process_data(
        &self,
        record: EntityRecord,
    ) -> Result<AnonymizedData, PipelineError> {
        let request = self.enqueue(record, true)?;
        let request_id = request.1;
        let receiver = request.0.ok_or_else(|| {
            PipelineError::ChannelClosed("completion handle missing".to_string())
        })?;

        let timeout_ms = self.shared.config.pipeline.timeout_ms;
        match timeout(Duration::from_millis(timeout_ms), receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(PipelineError::ChannelClosed(
                "completion channel dropped".to_string(),
            )),
            Err(_) => {
                // Drop the completion handle so a late result is discarded.
                if let Ok(mut pending) = self.shared.pending.lock() {
                    pending.remove(&request_id);
                }
                Err(PipelineError::Timeout {
                    request_id: request_id.to_string(),
                    timeout_ms,
                })
            }
        }
    }

    /// Enqueue a record without awaiting its result
    ///
    /// The outcome is observable through the event stream and metrics.
    pub fn submit(&self, record: EntityRecord) -> Result<Uuid, PipelineError> {
        self.enqueue(record, false).map(|(_, id)| id)
    }

    fn enqueue(
        &self,
        record: EntityRecord,
        with_handle: bool,
    ) -> Result<
        (
            Option<oneshot::Receiver<Result<AnonymizedData, PipelineError>>>,
            Uuid,
        ),
        PipelineError,
    > {
        match self.shared.state() {
            PipelineState::Running | PipelineState::Paused => {}
            other => return Err(PipelineError::NotRunning(other.to_string())),
        }

        let request = ProcessingRequest::new(record);
        let request_id = request.id;

        let receiver = if with_handle {
            let (tx, rx) = oneshot::channel();
            self.shared
                .pending
                .lock()
                .map_err(|_| PipelineError::ChannelClosed("pending map poisoned".to_string()))?
                .insert(request_id, tx);
            Some(rx)
        } else {
            None
        };

        self.shared
            .input
            .lock()
            .map_err(|_| PipelineError::ChannelClosed("input queue poisoned".to_string()))?
            .push_back(request);
        self.shared.wakeup.notify_one();
        Ok((receiver, request_id))
    }

    /// Drain in-flight work, flush the output buffer, and stop the pool
    ///
    /// Idempotent: stopping a stopped pipeline is a no-op.
    pub async fn stop(&self) -> Result<(), PipelineError> {
        let mut running = self.running.lock().await;
        let Some(tasks) = running.take() else {
            return Ok(());
        };
        self.shared.set_state(PipelineState::Stopping);

        // Drain: wait for the queue, dispatched work, and backoff-scheduled
        // retries to settle, bounded so a wedged worker cannot block shutdown
        // forever.
        let deadline =
            Instant::now() + Duration::from_millis(self.shared.config.pipeline.timeout_ms * 2);
        while self.shared.queue_depth() > 0
            || self.shared.pending_count() > 0
            || self.shared.in_flight() > 0
        {
            if Instant::now() >= deadline {
                warn!(
                    queued = self.shared.queue_depth(),
                    pending = self.shared.pending_count(),
                    in_flight = self.shared.in_flight(),
                    "drain deadline reached, stopping with work outstanding"
                );
                break;
            }
            self.shared.wakeup.notify_one();
            sleep(Duration::from_millis(10)).await;
        }

        // Closing the request channels and the shutdown signal stops the
        // workers; the results task exits when the last worker does.
        let _ = tasks.shutdown.send(true);
        drop(tasks.worker_txs);
        for task in tasks.tasks {
            let _ = task.await;
        }

        // Anything a caller is still waiting on will never arrive.
        if let Ok(mut pending) = self.shared.pending.lock() {
            for (_, sender) in pending.drain() {
                let _ = sender.send(Err(PipelineError::ChannelClosed(
                    "pipeline stopped".to_string(),
                )));
            }
        }

        flush_output(&self.shared).await;
        self.shared.set_state(PipelineState::Stopped);
        info!("pipeline stopped");
        Ok(())
    }
}

/// Move queued requests onto worker channels and flush on a timer
async fn dispatch_loop(
    shared: Arc<Shared>,
    worker_txs: Vec<mpsc::Sender<ProcessingRequest>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut flush_tick = interval(Duration::from_millis(
        shared.config.pipeline.flush_interval_ms,
    ));
    let mut next_worker = 0usize;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = shared.wakeup.notified() => {}
            _ = flush_tick.tick() => {
                flush_output(&shared).await;
            }
        }

        // Paused pipelines keep queueing but dispatch nothing.
        if shared.state() != PipelineState::Paused {
            let dispatched = dispatch_pending(&shared, &worker_txs, &mut next_worker);
            // More than one batch queued: come straight back for the rest.
            if dispatched && shared.queue_depth() > 0 {
                shared.wakeup.notify_one();
            }
        }
        if shared.output_buffered() >= shared.config.pipeline.output_buffer_size {
            flush_output(&shared).await;
        }
        shared
            .metrics
            .set_depths(shared.queue_depth(), shared.output_buffered());
    }
}

/// Pop up to one batch from the input queue and round-robin it across
/// workers; a request that finds every channel full goes back to the front.
/// Returns whether anything was handed to a worker.
fn dispatch_pending(
    shared: &Shared,
    worker_txs: &[mpsc::Sender<ProcessingRequest>],
    next_worker: &mut usize,
) -> bool {
    let mut dispatched = false;
    for _ in 0..shared.config.pipeline.batch_size {
        let request = match shared.input.lock() {
            Ok(mut input) => match input.pop_front() {
                Some(request) => {
                    // Counted before the queue lock drops so the stop()
                    // drain never sees the request in neither place.
                    shared.in_flight.fetch_add(1, Ordering::AcqRel);
                    request
                }
                None => return dispatched,
            },
            Err(_) => return dispatched,
        };

        let mut request = Some(request);
        for _ in 0..worker_txs.len() {
            let idx = *next_worker % worker_txs.len();
            *next_worker = next_worker.wrapping_add(1);
            let Some(r) = request.take() else { break };
            match worker_txs[idx].try_send(r) {
                Ok(()) => {
                    dispatched = true;
                    break;
                }
                Err(mpsc::error::TrySendError::Full(r))
                | Err(mpsc::error::TrySendError::Closed(r)) => {
                    request = Some(r);
                }
            }
        }

        if let Some(request) = request {
            // Every worker is busy (or gone); keep ordering and stop here.
            if let Ok(mut input) = shared.input.lock() {
                input.push_front(request);
            }
            shared.in_flight.fetch_sub(1, Ordering::AcqRel);
            return dispatched;
        }
    }
    dispatched
}

/// Settle worker outcomes: buffer successes, retry or quarantine failures
async fn results_loop(shared: Arc<Shared>, mut outcomes: mpsc::UnboundedReceiver<WorkerOutcome>) {
    while let Some(outcome) = outcomes.recv().await {
        match outcome {
            WorkerOutcome::Finished {
                request,
                result: Ok(data),
                elapsed_ms,
            } => {
                let quality = data.metadata.data_quality;
                let risk = data.metadata.risk_score;
                shared.metrics.record_success(elapsed_ms, quality, risk);
                shared.emit(PipelineEvent::DataProcessed {
                    request_id: request.id,
                    kind: data.kind,
                    quality,
                    risk,
                    elapsed_ms,
                });
                let min_quality = shared.config.pipeline.alerts.min_quality;
                if quality < min_quality {
                    shared.emit(PipelineEvent::QualityAlert {
                        request_id: request.id,
                        kind: data.kind,
                        quality,
                        threshold: min_quality,
                    });
                }

                shared.resolve(request.id, Ok(data.clone()));
                if let Ok(mut output) = shared.output.lock() {
                    output.push(data);
                }
                shared.in_flight.fetch_sub(1, Ordering::AcqRel);
                if shared.output_buffered() >= shared.config.pipeline.output_buffer_size {
                    flush_output(&shared).await;
                }
            }
            WorkerOutcome::Finished {
                request,
                result: Err(err),
                ..
            } => {
                handle_failure(&shared, request, err.reason, err.retryable).await;
            }
            WorkerOutcome::Panicked {
                worker_id,
                request,
                reason,
            } => {
                shared.emit(PipelineEvent::SystemError {
                    worker_id,
                    reason: reason.clone(),
                });
                handle_failure(&shared, request, format!("worker panic: {reason}"), true).await;
            }
        }
    }
}

async fn handle_failure(
    shared: &Arc<Shared>,
    mut request: ProcessingRequest,
    reason: String,
    retryable: bool,
) {
    let max_retries = shared.config.pipeline.max_retries;

    if retryable && request.retry_count < max_retries {
        request.retry_count += 1;
        shared.metrics.record_retry();
        let delay_ms =
            shared.config.pipeline.retry_backoff_ms * 2u64.saturating_pow(request.retry_count - 1);
        warn!(
            request_id = %request.id,
            attempt = request.retry_count,
            delay_ms,
            reason,
            "retry scheduled"
        );
        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            sleep(Duration::from_millis(delay_ms)).await;
            if let Ok(mut input) = shared.input.lock() {
                // Retries go to the front so an old request cannot starve.
                input.push_front(request);
            }
            // Back in the queue; the queue depth covers it from here.
            shared.in_flight.fetch_sub(1, Ordering::AcqRel);
            shared.wakeup.notify_one();
        });
        return;
    }

    let attempts = request.retry_count + 1;
    if retryable {
        shared.metrics.record_failure();
    } else {
        shared.metrics.record_skip();
    }
    shared.emit(PipelineEvent::DataFailed {
        request_id: request.id,
        kind: request.record.kind(),
        attempts,
        reason: reason.clone(),
    });
    shared.resolve(
        request.id,
        Err(PipelineError::RetriesExhausted {
            request_id: request.id.to_string(),
            attempts,
            reason: reason.clone(),
        }),
    );

    if shared.config.pipeline.quarantine_failures {
        if let Err(e) = shared.quarantine.store(&request, &reason).await {
            warn!(request_id = %request.id, error = %e, "quarantine write failed");
        }
    }
    shared.in_flight.fetch_sub(1, Ordering::AcqRel);
}

/// Drain the output buffer and write it to storage in per-kind batches
///
/// A failed batch is put back at the head of the buffer for the next cycle;
/// flushing never drops records.
async fn flush_output(shared: &Arc<Shared>) {
    let batch: Vec<AnonymizedData> = match shared.output.lock() {
        Ok(mut output) => output.drain(..).collect(),
        Err(_) => return,
    };
    if batch.is_empty() {
        return;
    }

    let mut groups: Vec<(EntityKind, Vec<AnonymizedData>)> = Vec::new();
    for record in batch {
        match groups.iter_mut().find(|(kind, _)| *kind == record.kind) {
            Some((_, group)) => group.push(record),
            None => groups.push((record.kind, vec![record])),
        }
    }

    for (kind, group) in groups {
        match shared.storage.write_batch(kind, &group).await {
            Ok(()) => {
                shared.emit(PipelineEvent::BatchFlushed {
                    kind,
                    count: group.len(),
                });
            }
            Err(e) => {
                warn!(kind = %kind, count = group.len(), error = %e, "batch flush failed");
                shared.emit(PipelineEvent::BatchFlushFailed {
                    count: group.len(),
                    reason: e.to_string(),
                });
                if let Ok(mut output) = shared.output.lock() {
                    for (i, record) in group.into_iter().enumerate() {
                        output.insert(i, record);
                    }
                }
            }
        }
    }
}

/// Periodic depth refresh and threshold checks
async fn metrics_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(Duration::from_millis(
        shared.config.pipeline.metrics_interval_ms,
    ));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {}
        }
        shared
            .metrics
            .set_depths(shared.queue_depth(), shared.output_buffered());
        shared.metrics.set_memory(process_rss_bytes());
        for reason in shared
            .metrics
            .threshold_breaches(&shared.config.pipeline.alerts)
        {
            warn!(reason, "performance alert");
            shared.emit(PipelineEvent::PerformanceAlert { reason });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryQuarantineSink, MemoryStorageWriter};
    use crate::domain::record::{EventRecord, UserRecord};
    use crate::domain::AnonymizationError;
    use std::sync::atomic::AtomicU32;

    fn test_config() -> MantleConfig {
        let mut config = MantleConfig::for_tests();
        config.pipeline.worker_count = 2;
        config.pipeline.flush_interval_ms = 20;
        config.pipeline.metrics_interval_ms = 50;
        config.pipeline.timeout_ms = 2_000;
        config.pipeline.retry_backoff_ms = 5;
        config
    }

    fn build_pipeline(config: MantleConfig) -> (Pipeline, Arc<MemoryStorageWriter>, Arc<MemoryQuarantineSink>) {
        let config = Arc::new(config);
        let engine = Arc::new(AnonymizationEngine::new(Arc::clone(&config)).unwrap());
        let storage = Arc::new(MemoryStorageWriter::new());
        let quarantine = Arc::new(MemoryQuarantineSink::new());
        let pipeline = Pipeline::new(
            config,
            engine,
            Arc::clone(&storage) as Arc<dyn StorageWriter>,
            Arc::clone(&quarantine) as Arc<dyn QuarantineSink>,
        );
        (pipeline, storage, quarantine)
    }

    fn build_with_process(
        config: MantleConfig,
        process: ProcessFn,
    ) -> (Pipeline, Arc<MemoryStorageWriter>, Arc<MemoryQuarantineSink>) {
        let storage = Arc::new(MemoryStorageWriter::new());
        let quarantine = Arc::new(MemoryQuarantineSink::new());
        let pipeline = Pipeline::with_process(
            Arc::new(config),
            process,
            Arc::clone(&storage) as Arc<dyn StorageWriter>,
            Arc::clone(&quarantine) as Arc<dyn QuarantineSink>,
        );
        (pipeline, storage, quarantine)
    }

    fn user(id: &str) -> EntityRecord {
        EntityRecord::User(UserRecord {
            id: id.to_string(),
            organization_id: Some("org-1".to_string()),
            email: Some("x@y.com".to_string()),
            full_name: None,
            role: Some("Engineer".to_string()),
            industry: Some("tech".to_string()),
            organization_size: Some(40),
            country: Some("US".to_string()),
            plan: None,
            bio: None,
            created_at: None,
        })
    }

    fn invalid_event() -> EntityRecord {
        EntityRecord::Event(EventRecord {
            id: String::new(),
            user_id: None,
            session_id: None,
            event_type: "x".to_string(),
            properties: Default::default(),
            device: None,
            browser: None,
            occurred_at: None,
        })
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let (pipeline, _, _) = build_pipeline(test_config());
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        pipeline.start().await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::Running);
        let status = pipeline.status();
        assert_eq!(status.state, "running");
        assert_eq!(status.worker_count, 2);
        assert!(matches!(
            pipeline.start().await,
            Err(PipelineError::AlreadyRunning)
        ));
        pipeline.stop().await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        // Stop is idempotent
        pipeline.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_when_stopped() {
        let (pipeline, _, _) = build_pipeline(test_config());
        let err = pipeline.process_data(user("u1")).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotRunning(_)));
    }

    #[tokio::test]
    async fn test_process_data_returns_result_and_flushes() {
        let (pipeline, storage, _) = build_pipeline(test_config());
        pipeline.start().await.unwrap();

        let out = pipeline.process_data(user("u1")).await.unwrap();
        assert_ne!(out.id, "u1");
        assert_eq!(out.kind, EntityKind::User);

        pipeline.stop().await.unwrap();
        assert_eq!(storage.written(EntityKind::User).len(), 1);
        let metrics = pipeline.metrics();
        assert_eq!(metrics.processed, 1);
        assert_eq!(metrics.failed, 0);
    }

    #[tokio::test]
    async fn test_pause_queues_resume_drains() {
        let (pipeline, storage, _) = build_pipeline(test_config());
        pipeline.start().await.unwrap();
        pipeline.pause().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Paused);

        let id = pipeline.submit(user("u1")).unwrap();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(pipeline.metrics().processed, 0);
        assert!(!id.is_nil());

        pipeline.resume().unwrap();
        pipeline.stop().await.unwrap();
        assert_eq!(storage.written(EntityKind::User).len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_record_quarantined_without_retries() {
        let (pipeline, _, quarantine) = build_pipeline(test_config());
        pipeline.start().await.unwrap();

        let err = pipeline.process_data(invalid_event()).await.unwrap_err();
        assert!(matches!(err, PipelineError::RetriesExhausted { attempts: 1, .. }));

        pipeline.stop().await.unwrap();
        assert_eq!(quarantine.len(), 1);
        let metrics = pipeline.metrics();
        assert_eq!(metrics.skipped, 1);
        assert_eq!(metrics.retried, 0);
    }

    #[tokio::test]
    async fn test_flush_failure_requeues_and_recovers() {
        let (pipeline, storage, _) = build_pipeline(test_config());
        storage.fail_next_writes(1);
        pipeline.start().await.unwrap();

        let mut events = pipeline.subscribe();
        pipeline.process_data(user("u1")).await.unwrap();
        pipeline.stop().await.unwrap();

        // The record survived the failed flush and landed on a later one
        assert_eq!(storage.written(EntityKind::User).len(), 1);
        let mut saw_failure = false;
        let mut saw_flush = false;
        while let Ok(event) = events.try_recv() {
            match event {
                PipelineEvent::BatchFlushFailed { .. } => saw_failure = true,
                PipelineEvent::BatchFlushed { count: 1, .. } => saw_flush = true,
                _ => {}
            }
        }
        assert!(saw_failure);
        assert!(saw_flush);
    }

    #[tokio::test]
    async fn test_always_failing_record_retried_then_quarantined_once() {
        let mut config = test_config();
        config.pipeline.max_retries = 3;
        let process: ProcessFn =
            Arc::new(|_| Err(AnonymizationError::Hashing("key cache unavailable".to_string())));
        let (pipeline, storage, quarantine) = build_with_process(config, process);
        pipeline.start().await.unwrap();
        let mut events = pipeline.subscribe();

        let err = pipeline.process_data(user("u1")).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::RetriesExhausted { attempts: 4, .. }
        ));

        pipeline.stop().await.unwrap();
        assert_eq!(quarantine.len(), 1);
        assert!(storage.written(EntityKind::User).is_empty());

        let metrics = pipeline.metrics();
        assert_eq!(metrics.retried, 3);
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.processed, 0);

        // Exactly one terminal failure event after the retries
        let mut failed = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, PipelineEvent::DataFailed { attempts: 4, .. }) {
                failed += 1;
            }
        }
        assert_eq!(failed, 1);
    }

    #[tokio::test]
    async fn test_panicking_transform_contained_and_quarantined() {
        let mut config = test_config();
        config.pipeline.max_retries = 1;
        let engine =
            Arc::new(AnonymizationEngine::new(Arc::new(config.clone())).unwrap());
        let process: ProcessFn = Arc::new(move |record| {
            if matches!(record, EntityRecord::User(u) if u.id == "boom") {
                panic!("transform blew up");
            }
            engine.anonymize(record)
        });
        let (pipeline, storage, quarantine) = build_with_process(config, process);
        pipeline.start().await.unwrap();
        let mut events = pipeline.subscribe();

        let err = pipeline.process_data(user("boom")).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::RetriesExhausted { attempts: 2, .. }
        ));

        // The pool survived the panics and keeps taking valid work
        let out = pipeline.process_data(user("u1")).await.unwrap();
        assert_eq!(out.kind, EntityKind::User);

        pipeline.stop().await.unwrap();
        assert_eq!(quarantine.len(), 1);
        assert_eq!(storage.written(EntityKind::User).len(), 1);

        let mut saw_system_error = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, PipelineEvent::SystemError { .. }) {
                saw_system_error = true;
            }
        }
        assert!(saw_system_error);
    }

    #[tokio::test]
    async fn test_stop_waits_for_backoff_scheduled_retry() {
        let mut config = test_config();
        config.pipeline.retry_backoff_ms = 150;
        let engine =
            Arc::new(AnonymizationEngine::new(Arc::new(config.clone())).unwrap());
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let process: ProcessFn = Arc::new(move |record| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(AnonymizationError::Hashing(
                    "key cache unavailable".to_string(),
                ));
            }
            engine.anonymize(record)
        });
        let (pipeline, storage, quarantine) = build_with_process(config, process);
        pipeline.start().await.unwrap();

        // Fire and forget, then stop while the retry is still in backoff.
        pipeline.submit(user("u1")).unwrap();
        pipeline.stop().await.unwrap();

        assert_eq!(storage.written(EntityKind::User).len(), 1);
        assert_eq!(quarantine.len(), 0);
        let metrics = pipeline.metrics();
        assert_eq!(metrics.processed, 1);
        assert_eq!(metrics.retried, 1);
        assert_eq!(metrics.failed, 0);
    }

    #[tokio::test]
    async fn test_events_emitted_for_processed_records() {
        let (pipeline, _, _) = build_pipeline(test_config());
        pipeline.start().await.unwrap();
        let mut events = pipeline.subscribe();

        pipeline.process_data(user("u1")).await.unwrap();
        pipeline.stop().await.unwrap();

        let mut saw_processed = false;
        while let Ok(event) = events.try_recv() {
            if let PipelineEvent::DataProcessed { kind, .. } = event {
                assert_eq!(kind, EntityKind::User);
                saw_processed = true;
            }
        }
        assert!(saw_processed);
    }
}
