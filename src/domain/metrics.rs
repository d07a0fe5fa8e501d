//! Pipeline metrics snapshot
//!
//! [`ProcessingMetrics`] is the read-only view handed to callers; the
//! mutable counters live inside the pipeline's metrics recorder.

use serde::{Deserialize, Serialize};

/// A point-in-time snapshot of pipeline metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingMetrics {
    /// Records anonymized successfully
    pub processed: u64,
    /// Records that exhausted retries
    pub failed: u64,
    /// Retry attempts scheduled
    pub retried: u64,
    /// Records skipped (rejected before processing)
    pub skipped: u64,
    /// Moving average of per-record processing time in milliseconds
    pub avg_processing_ms: f64,
    /// Moving average of data quality scores
    pub avg_quality: f64,
    /// Moving average of risk scores
    pub avg_risk: f64,
    /// failed / (processed + failed), 0.0 when idle
    pub error_rate: f64,
    /// Records per second since the pipeline started
    pub throughput_per_sec: f64,
    /// Current input queue depth
    pub queue_depth: usize,
    /// Records sitting in the output buffer awaiting flush
    pub output_buffered: usize,
    /// Resident memory estimate in bytes, sampled on the metrics tick
    pub memory_bytes: u64,
}

impl ProcessingMetrics {
    /// Total records that reached a terminal state
    pub fn total_settled(&self) -> u64 {
        self.processed + self.failed
    }
}
