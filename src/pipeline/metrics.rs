//! Pipeline metrics recorder
//!
//! Counters are updated from the results task and read from anywhere via
//! [`MetricsRecorder::snapshot`]. Averages are running means over everything
//! recorded since the recorder was created; throughput is measured against
//! wall time since creation.

use crate::config::AlertThresholds;
use crate::domain::ProcessingMetrics;
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug, Default)]
struct Counters {
    processed: u64,
    failed: u64,
    retried: u64,
    skipped: u64,
    total_processing_ms: u64,
    total_quality: u64,
    total_risk: u64,
    queue_depth: usize,
    output_buffered: usize,
    memory_bytes: u64,
}

/// Mutable metrics state shared across pipeline tasks
pub struct MetricsRecorder {
    counters: Mutex<Counters>,
    started_at: Instant,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            started_at: Instant::now(),
        }
    }

    pub fn record_success(&self, elapsed_ms: u64, quality: u8, risk: u8) {
        if let Ok(mut c) = self.counters.lock() {
            c.processed += 1;
            c.total_processing_ms += elapsed_ms;
            c.total_quality += u64::from(quality);
            c.total_risk += u64::from(risk);
        }
    }

    pub fn record_failure(&self) {
        if let Ok(mut c) = self.counters.lock() {
            c.failed += 1;
        }
    }

    pub fn record_retry(&self) {
        if let Ok(mut c) = self.counters.lock() {
            c.retried += 1;
        }
    }

    pub fn record_skip(&self) {
        if let Ok(mut c) = self.counters.lock() {
            c.skipped += 1;
        }
    }

    pub fn set_depths(&self, queue_depth: usize, output_buffered: usize) {
        if let Ok(mut c) = self.counters.lock() {
            c.queue_depth = queue_depth;
            c.output_buffered = output_buffered;
        }
    }

    pub fn set_memory(&self, bytes: u64) {
        if let Ok(mut c) = self.counters.lock() {
            c.memory_bytes = bytes;
        }
    }

    /// A point-in-time snapshot for callers
    pub fn snapshot(&self) -> ProcessingMetrics {
        let c = match self.counters.lock() {
            Ok(c) => c,
            Err(_) => return ProcessingMetrics::default(),
        };
        let settled = c.processed + c.failed;
        let elapsed_secs = self.started_at.elapsed().as_secs_f64().max(f64::EPSILON);
        ProcessingMetrics {
            processed: c.processed,
            failed: c.failed,
            retried: c.retried,
            skipped: c.skipped,
            avg_processing_ms: ratio(c.total_processing_ms, c.processed),
            avg_quality: ratio(c.total_quality, c.processed),
            avg_risk: ratio(c.total_risk, c.processed),
            error_rate: if settled == 0 {
                0.0
            } else {
                c.failed as f64 / settled as f64
            },
            throughput_per_sec: c.processed as f64 / elapsed_secs,
            queue_depth: c.queue_depth,
            output_buffered: c.output_buffered,
            memory_bytes: c.memory_bytes,
        }
    }

    /// Threshold breaches for the current snapshot, as alert reasons
    pub fn threshold_breaches(&self, thresholds: &AlertThresholds) -> Vec<String> {
        let snapshot = self.snapshot();
        let mut reasons = Vec::new();
        if snapshot.total_settled() > 0 && snapshot.error_rate > thresholds.max_error_rate {
            reasons.push(format!(
                "error rate {:.3} over limit {:.3}",
                snapshot.error_rate, thresholds.max_error_rate
            ));
        }
        if snapshot.processed > 0 && snapshot.avg_processing_ms > thresholds.max_avg_latency_ms {
            reasons.push(format!(
                "average latency {:.1}ms over limit {:.1}ms",
                snapshot.avg_processing_ms, thresholds.max_avg_latency_ms
            ));
        }
        if snapshot.queue_depth > thresholds.max_queue_depth {
            reasons.push(format!(
                "queue depth {} over limit {}",
                snapshot.queue_depth, thresholds.max_queue_depth
            ));
        }
        if thresholds.max_memory_bytes > 0 && snapshot.memory_bytes > thresholds.max_memory_bytes {
            reasons.push(format!(
                "resident memory {} bytes over limit {} bytes",
                snapshot.memory_bytes, thresholds.max_memory_bytes
            ));
        }
        reasons
    }
}

/// Coarse resident-set size of the current process
///
/// Reads the page count from `/proc/self/statm` (pages assumed 4 KiB). On
/// platforms without procfs the gauge reads 0 and the memory threshold never
/// fires.
pub fn process_rss_bytes() -> u64 {
    #[cfg(target_os = "linux")]
    {
        let pages = std::fs::read_to_string("/proc/self/statm")
            .ok()
            .and_then(|s| s.split_whitespace().nth(1).and_then(|v| v.parse::<u64>().ok()));
        if let Some(pages) = pages {
            return pages * 4096;
        }
    }
    0
}

fn ratio(total: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}
