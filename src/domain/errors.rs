//! Domain error types
//!
//! This module defines the error hierarchy for Mantle. All errors are
//! domain-specific and don't expose third-party types.

use crate::domain::record::EntityKind;
use thiserror::Error;

/// Main Mantle error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum MantleError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Anonymization engine errors
    #[error("Anonymization error: {0}")]
    Anonymization(#[from] AnonymizationError),

    /// Pipeline errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Storage writer errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Anonymization engine errors
///
/// Errors raised while transforming a single record. Key derivation and
/// pattern compilation failures are startup errors and prevent the engine
/// from being constructed at all; the remaining variants are per-record.
#[derive(Debug, Error)]
pub enum AnonymizationError {
    /// Domain key derivation failed (fatal at startup)
    #[error("Key derivation failed for domain '{domain}': {reason}")]
    KeyDerivation { domain: String, reason: String },

    /// A salt was missing or empty (fatal at startup)
    #[error("Invalid salt for domain '{0}': salt must not be empty")]
    InvalidSalt(String),

    /// A PII detection pattern failed to compile (fatal at startup)
    #[error("Invalid PII pattern '{name}': {reason}")]
    InvalidPattern { name: String, reason: String },

    /// Identifier hashing failed
    #[error("Hashing failed: {0}")]
    Hashing(String),

    /// Transform of a specific entity failed, carrying the entity kind
    /// and the underlying cause
    #[error("Anonymization failed for {kind} record: {source}")]
    EntityFailed {
        kind: EntityKind,
        #[source]
        source: Box<AnonymizationError>,
    },

    /// Strict compliance mode rejected the record
    #[error("{kind} record rejected by strict compliance mode: {flags:?}")]
    ComplianceRejected {
        kind: EntityKind,
        flags: Vec<String>,
    },

    /// Record was structurally unusable (e.g. empty primary key)
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl AnonymizationError {
    /// Wrap an error with the entity kind it occurred on
    pub fn for_entity(kind: EntityKind, source: AnonymizationError) -> Self {
        Self::EntityFailed {
            kind,
            source: Box::new(source),
        }
    }
}

/// Pipeline orchestrator errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Pipeline is not accepting requests
    #[error("Pipeline is not running (state: {0})")]
    NotRunning(String),

    /// Pipeline is already running
    #[error("Pipeline is already running")]
    AlreadyRunning,

    /// A `process_data` call did not complete within the configured timeout
    #[error("Processing request {request_id} timed out after {timeout_ms}ms")]
    Timeout { request_id: String, timeout_ms: u64 },

    /// A request exhausted its retries
    #[error("Processing request {request_id} failed after {attempts} attempts: {reason}")]
    RetriesExhausted {
        request_id: String,
        attempts: u32,
        reason: String,
    },

    /// Internal channel closed unexpectedly
    #[error("Pipeline channel closed: {0}")]
    ChannelClosed(String),

    /// A worker panicked while processing a request
    #[error("Worker {worker_id} panicked: {reason}")]
    WorkerPanic { worker_id: usize, reason: String },

    /// Output batch flush failed
    #[error("Batch flush failed: {0}")]
    FlushFailed(String),

    /// Quarantine sink write failed
    #[error("Quarantine write failed: {0}")]
    QuarantineFailed(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for MantleError {
    fn from(err: std::io::Error) -> Self {
        MantleError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for MantleError {
    fn from(err: serde_json::Error) -> Self {
        MantleError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for MantleError {
    fn from(err: toml::de::Error) -> Self {
        MantleError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mantle_error_display() {
        let err = MantleError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_anonymization_error_conversion() {
        let anon_err = AnonymizationError::Hashing("bad key".to_string());
        let err: MantleError = anon_err.into();
        assert!(matches!(err, MantleError::Anonymization(_)));
    }

    #[test]
    fn test_pipeline_error_conversion() {
        let pipe_err = PipelineError::NotRunning("stopped".to_string());
        let err: MantleError = pipe_err.into();
        assert!(matches!(err, MantleError::Pipeline(_)));
    }

    #[test]
    fn test_entity_failed_carries_kind_and_cause() {
        let inner = AnonymizationError::Hashing("hmac failure".to_string());
        let err = AnonymizationError::for_entity(EntityKind::User, inner);
        let text = err.to_string();
        assert!(text.contains("user"));
        assert!(text.contains("hmac failure"));
        // The underlying cause is reachable through the error chain
        let source = std::error::Error::source(&err);
        assert!(source.is_some());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: MantleError = io_err.into();
        assert!(matches!(err, MantleError::Io(_)));
    }

    #[test]
    fn test_errors_implement_std_error() {
        let err = MantleError::Storage("write failed".to_string());
        let _: &dyn std::error::Error = &err;
        let err = PipelineError::AlreadyRunning;
        let _: &dyn std::error::Error = &err;
    }
}
