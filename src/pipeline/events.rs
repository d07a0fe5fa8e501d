//! Pipeline event stream
//!
//! The orchestrator publishes typed events on a `tokio::sync::broadcast`
//! channel. Subscribers (the CLI, alerting hooks, tests) receive every event
//! emitted after they subscribe; slow subscribers lose the oldest events
//! rather than backpressuring the pipeline.

use crate::domain::EntityKind;
use serde::Serialize;
use uuid::Uuid;

/// Capacity of the broadcast channel backing the event stream
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted by the pipeline orchestrator
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A record was anonymized and buffered for flush
    DataProcessed {
        request_id: Uuid,
        kind: EntityKind,
        quality: u8,
        risk: u8,
        elapsed_ms: u64,
    },
    /// A request exhausted its retries
    DataFailed {
        request_id: Uuid,
        kind: EntityKind,
        attempts: u32,
        reason: String,
    },
    /// A processed record fell below the quality floor
    QualityAlert {
        request_id: Uuid,
        kind: EntityKind,
        quality: u8,
        threshold: u8,
    },
    /// A metrics tick crossed an alert threshold
    PerformanceAlert { reason: String },
    /// A worker failed outside normal per-record error handling
    SystemError { worker_id: usize, reason: String },
    /// An output batch reached storage
    BatchFlushed { kind: EntityKind, count: usize },
    /// An output batch failed to reach storage and was re-queued
    BatchFlushFailed { count: usize, reason: String },
}

impl PipelineEvent {
    /// Short label used in logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::DataProcessed { .. } => "data_processed",
            Self::DataFailed { .. } => "data_failed",
            Self::QualityAlert { .. } => "quality_alert",
            Self::PerformanceAlert { .. } => "performance_alert",
            Self::SystemError { .. } => "system_error",
            Self::BatchFlushed { .. } => "batch_flushed",
            Self::BatchFlushFailed { .. } => "batch_flush_failed",
        }
    }
}
