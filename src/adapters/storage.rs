//! Output storage writers
//!
//! The pipeline flushes anonymized records in per-kind batches through the
//! [`StorageWriter`] trait. Two implementations ship with the crate: an
//! in-memory writer for tests and an NDJSON file writer for the CLI. Database
//! sinks plug in behind the same trait.

use crate::domain::{AnonymizedData, EntityKind, MantleError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Destination for anonymized record batches
///
/// `write_batch` must be atomic per call from the pipeline's point of view:
/// on error the pipeline assumes nothing was written and re-queues the whole
/// batch, so writers that partially succeed should deduplicate on
/// `original_data_hash`.
#[async_trait]
pub trait StorageWriter: Send + Sync {
    /// Write one batch of records, all of the same entity kind
    async fn write_batch(&self, kind: EntityKind, batch: &[AnonymizedData]) -> Result<()>;
}

/// In-memory storage writer for tests and dry runs
///
/// Keeps every written record grouped by kind and can be told to fail the
/// next N writes to exercise the pipeline's flush retry path.
#[derive(Default)]
pub struct MemoryStorageWriter {
    records: Mutex<HashMap<EntityKind, Vec<AnonymizedData>>>,
    fail_next: AtomicU32,
}

impl MemoryStorageWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` `write_batch` calls fail
    pub fn fail_next_writes(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// All records written for a kind, in write order
    pub fn written(&self, kind: EntityKind) -> Vec<AnonymizedData> {
        self.records
            .lock()
            .map(|records| records.get(&kind).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Total records written across all kinds
    pub fn total_written(&self) -> usize {
        self.records
            .lock()
            .map(|records| records.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl StorageWriter for MemoryStorageWriter {
    async fn write_batch(&self, kind: EntityKind, batch: &[AnonymizedData]) -> Result<()> {
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(MantleError::Storage("injected write failure".to_string()));
        }
        let mut records = self
            .records
            .lock()
            .map_err(|_| MantleError::Storage("memory writer lock poisoned".to_string()))?;
        records
            .entry(kind)
            .or_default()
            .extend_from_slice(batch);
        Ok(())
    }
}

/// NDJSON file writer, one file per entity kind
///
/// Appends each record as one JSON line to `<dir>/<kind>.ndjson`. The
/// directory is created on first write.
pub struct JsonlStorageWriter {
    dir: PathBuf,
}

impl JsonlStorageWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl StorageWriter for JsonlStorageWriter {
    async fn write_batch(&self, kind: EntityKind, batch: &[AnonymizedData]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{kind}.ndjson"));
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let mut buf = Vec::with_capacity(batch.len() * 256);
        for record in batch {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }
        file.write_all(&buf).await?;
        file.flush().await?;

        debug!(kind = %kind, count = batch.len(), path = %path.display(), "batch written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn record(kind: EntityKind, id: &str) -> AnonymizedData {
        AnonymizedData::new(
            id.to_string(),
            kind,
            "digest".to_string(),
            Map::new(),
            vec![],
            90,
            10,
        )
    }

    #[tokio::test]
    async fn test_memory_writer_groups_by_kind() {
        let writer = MemoryStorageWriter::new();
        writer
            .write_batch(EntityKind::User, &[record(EntityKind::User, "a")])
            .await
            .unwrap();
        writer
            .write_batch(EntityKind::Event, &[record(EntityKind::Event, "b")])
            .await
            .unwrap();
        assert_eq!(writer.written(EntityKind::User).len(), 1);
        assert_eq!(writer.written(EntityKind::Event).len(), 1);
        assert_eq!(writer.total_written(), 2);
    }

    #[tokio::test]
    async fn test_memory_writer_failure_injection() {
        let writer = MemoryStorageWriter::new();
        writer.fail_next_writes(1);
        let batch = [record(EntityKind::User, "a")];
        assert!(writer.write_batch(EntityKind::User, &batch).await.is_err());
        // The injected failure is consumed; the retry succeeds
        assert!(writer.write_batch(EntityKind::User, &batch).await.is_ok());
        assert_eq!(writer.total_written(), 1);
    }

    #[tokio::test]
    async fn test_jsonl_writer_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonlStorageWriter::new(dir.path());
        let batch = [
            record(EntityKind::Response, "r1"),
            record(EntityKind::Response, "r2"),
        ];
        writer
            .write_batch(EntityKind::Response, &batch)
            .await
            .unwrap();
        writer
            .write_batch(EntityKind::Response, &batch[..1])
            .await
            .unwrap();

        let content =
            std::fs::read_to_string(dir.path().join("response.ndjson")).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        let parsed: AnonymizedData = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.id, "r1");
    }
}
