//! Processing requests owned by the pipeline orchestrator
//!
//! A request is created per `process_data` call and destroyed on success
//! (its output moves to the output buffer) or on reaching quarantine.

use crate::domain::record::EntityRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of work queued for anonymization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingRequest {
    /// Unique request id, also used to key the caller's completion handle
    pub id: Uuid,
    /// The record to anonymize
    pub record: EntityRecord,
    /// When the request entered the pipeline
    pub submitted_at: DateTime<Utc>,
    /// How many times this request has been retried
    pub retry_count: u32,
}

impl ProcessingRequest {
    /// Create a new request for a record
    pub fn new(record: EntityRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            record,
            submitted_at: Utc::now(),
            retry_count: 0,
        }
    }
}
