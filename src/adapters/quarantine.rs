//! Quarantine sink for requests that exhausted their retries
//!
//! Quarantined requests keep the raw record, so the sink is a trust boundary:
//! its contents are as sensitive as the source data and fall under the
//! `retention.quarantine_days` window.

use crate::domain::{MantleError, ProcessingRequest, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// A quarantined request with its failure reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantineEntry {
    pub request: ProcessingRequest,
    pub reason: String,
    pub quarantined_at: DateTime<Utc>,
}

/// Destination for requests that could not be processed
#[async_trait]
pub trait QuarantineSink: Send + Sync {
    /// Persist one failed request with the reason it failed
    async fn store(&self, request: &ProcessingRequest, reason: &str) -> Result<()>;
}

/// In-memory quarantine sink for tests
#[derive(Default)]
pub struct MemoryQuarantineSink {
    entries: Mutex<Vec<QuarantineEntry>>,
}

impl MemoryQuarantineSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<QuarantineEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl QuarantineSink for MemoryQuarantineSink {
    async fn store(&self, request: &ProcessingRequest, reason: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| MantleError::Storage("quarantine lock poisoned".to_string()))?;
        entries.push(QuarantineEntry {
            request: request.clone(),
            reason: reason.to_string(),
            quarantined_at: Utc::now(),
        });
        Ok(())
    }
}

/// NDJSON quarantine file, one entry per line
pub struct JsonlQuarantineSink {
    path: PathBuf,
}

impl JsonlQuarantineSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl QuarantineSink for JsonlQuarantineSink {
    async fn store(&self, request: &ProcessingRequest, reason: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let entry = QuarantineEntry {
            request: request.clone(),
            reason: reason.to_string(),
            quarantined_at: Utc::now(),
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        warn!(
            request_id = %request.id,
            kind = %request.record.kind(),
            reason,
            "request quarantined"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{EntityRecord, EventRecord};

    fn request() -> ProcessingRequest {
        ProcessingRequest::new(EntityRecord::Event(EventRecord {
            id: "ev-1".to_string(),
            user_id: None,
            session_id: None,
            event_type: "login".to_string(),
            properties: Default::default(),
            device: None,
            browser: None,
            occurred_at: None,
        }))
    }

    #[tokio::test]
    async fn test_memory_sink_records_reason() {
        let sink = MemoryQuarantineSink::new();
        sink.store(&request(), "retries exhausted").await.unwrap();
        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reason, "retries exhausted");
    }

    #[tokio::test]
    async fn test_jsonl_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quarantine.ndjson");
        let sink = JsonlQuarantineSink::new(&path);
        sink.store(&request(), "first").await.unwrap();
        sink.store(&request(), "second").await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let entries: Vec<QuarantineEntry> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].reason, "second");
    }
}
