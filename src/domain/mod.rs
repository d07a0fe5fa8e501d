//! Domain models and types for Mantle.
//!
//! This module contains the core domain models shared by the anonymization
//! engine and the pipeline orchestrator:
//!
//! - **Entity records** ([`EntityRecord`]) - the tagged union over the five
//!   entity kinds that flow through the pipeline
//! - **Anonymized output** ([`AnonymizedData`]) - anonymized payload plus
//!   quality/risk metadata
//! - **Processing requests** ([`ProcessingRequest`]) - pipeline work items
//! - **Risk model** ([`ReIdentificationRisk`]) - re-identification risk scoring
//! - **Metrics** ([`ProcessingMetrics`]) - read-only pipeline metrics snapshot
//! - **Error types** ([`MantleError`], [`AnonymizationError`], [`PipelineError`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, MantleError>`]:
//!
//! ```rust
//! use mantle::domain::Result;
//!
//! fn example() -> Result<()> {
//!     // Errors are automatically converted using the ? operator
//!     let config = mantle::config::load_config("mantle.toml")?;
//!     Ok(())
//! }
//! ```

pub mod anonymized;
pub mod errors;
pub mod metrics;
pub mod record;
pub mod request;
pub mod risk;

// Re-export commonly used types for convenience
pub use anonymized::{AnonymizationMetadata, AnonymizedData};
pub use errors::{AnonymizationError, MantleError, PipelineError};
pub use metrics::ProcessingMetrics;
pub use record::{
    AnswerPayload, AssessmentRecord, EntityKind, EntityRecord, EventRecord, OrganizationRecord,
    ResponseRecord, UserRecord,
};
pub use request::ProcessingRequest;
pub use risk::{ReIdentificationRisk, RiskFactor};

/// Result type used throughout Mantle
pub type Result<T, E = MantleError> = std::result::Result<T, E>;
