//! Anonymization engine
//!
//! Everything that turns a raw entity record into an anonymized one:
//!
//! - [`hasher`]: consistent, irreversible identifier hashing with per-domain
//!   derived keys
//! - [`rules`]: PII detection and redaction for free-text fields
//! - [`generalize`]: pure generalization transforms into closed category sets
//! - [`noise`]: the Laplace mechanism for differentially private durations
//! - [`risk`]: re-identification risk scoring
//! - [`compliance`]: advisory compliance validation of engine output
//! - [`engine`]: the façade tying the above together
//!
//! The engine is deterministic for a given configuration except for
//! optional Laplace noise: the same input always yields the same tokens and
//! categories, which is what preserves referential integrity across
//! anonymized tables.

pub mod compliance;
pub mod engine;
pub mod generalize;
pub mod hasher;
pub mod noise;
pub mod risk;
pub mod rules;

pub use compliance::ComplianceMode;
pub use engine::AnonymizationEngine;
pub use hasher::{IdentityHasher, SaltDomain};
pub use noise::LaplaceNoise;
pub use risk::RiskAssessor;
pub use rules::{PiiAction, PiiRule, Sanitizer, Sensitivity};
