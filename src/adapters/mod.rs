//! Output adapters
//!
//! The pipeline talks to the outside world through two traits: a
//! [`StorageWriter`] for anonymized batches and a [`QuarantineSink`] for
//! requests that exhausted their retries. File-backed and in-memory
//! implementations live here.

pub mod quarantine;
pub mod storage;

pub use quarantine::{JsonlQuarantineSink, MemoryQuarantineSink, QuarantineEntry, QuarantineSink};
pub use storage::{JsonlStorageWriter, MemoryStorageWriter, StorageWriter};
