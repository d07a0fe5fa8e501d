// Mantle - Assessment Data Anonymization Pipeline
// Copyright (c) 2026 Mantle Contributors
// Licensed under the MIT License

//! # Mantle - Assessment Data Anonymization Pipeline
//!
//! Mantle anonymizes assessment platform data (users, organizations,
//! assessments, responses, behavioral events) for analytics, benchmarking,
//! and research while preserving referential integrity across the anonymized
//! tables.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Hashing** identifiers consistently and irreversibly with per-domain
//!   derived keys
//! - **Detecting** PII in free text and removing, hashing, masking, or
//!   generalizing it
//! - **Generalizing** quasi-identifiers into closed category sets
//! - **Scoring** re-identification risk and data quality per record
//! - **Validating** output against GDPR / HIPAA / CCPA rule sets
//! - **Orchestrating** the above through a resilient worker pool with
//!   retries, quarantine, and batched output
//!
//! ## Architecture
//!
//! Mantle follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`anonymization`] - The anonymization engine (hashing, PII rules,
//!   generalization, noise, risk, compliance)
//! - [`pipeline`] - Worker pool orchestration, retries, metrics, events
//! - [`adapters`] - Output sinks (storage writers, quarantine)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mantle::adapters::{MemoryQuarantineSink, MemoryStorageWriter};
//! use mantle::anonymization::AnonymizationEngine;
//! use mantle::config::load_config;
//! use mantle::domain::{EntityRecord, UserRecord};
//! use mantle::pipeline::Pipeline;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(load_config("mantle.toml")?);
//!     let engine = Arc::new(AnonymizationEngine::new(Arc::clone(&config))?);
//!     let pipeline = Pipeline::new(
//!         config,
//!         engine,
//!         Arc::new(MemoryStorageWriter::new()),
//!         Arc::new(MemoryQuarantineSink::new()),
//!     );
//!
//!     pipeline.start().await?;
//!     let record = EntityRecord::User(UserRecord {
//!         id: "u-123".to_string(),
//!         organization_id: Some("org-9".to_string()),
//!         email: Some("jane@example.com".to_string()),
//!         full_name: None,
//!         role: Some("Engineer".to_string()),
//!         industry: Some("Software".to_string()),
//!         organization_size: Some(120),
//!         country: Some("DE".to_string()),
//!         plan: None,
//!         bio: None,
//!         created_at: None,
//!     });
//!     let anonymized = pipeline.process_data(record).await?;
//!     println!("token: {}", anonymized.id);
//!     pipeline.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Consistency
//!
//! The same identifier in the same salt domain always maps to the same
//! token, across workers, runs, and entity kinds. This is what lets
//! anonymized responses still join to anonymized users:
//!
//! ```rust,no_run
//! use mantle::anonymization::{IdentityHasher, SaltDomain};
//! use mantle::config::SaltsConfig;
//!
//! # fn example(salts: &SaltsConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let hasher = IdentityHasher::new(salts)?;
//! let a = hasher.hash("u-123", SaltDomain::User)?;
//! let b = hasher.hash("u-123", SaltDomain::User)?;
//! assert_eq!(a, b);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Mantle uses the [`domain::MantleError`] type for all errors:
//!
//! ```rust,no_run
//! use mantle::domain::MantleError;
//!
//! fn example() -> Result<(), MantleError> {
//!     let config = mantle::config::load_config("mantle.toml")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//!
//! Mantle uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!("Starting pipeline");
//! warn!(request_id = "abc", "Retrying request");
//! ```

pub mod adapters;
pub mod anonymization;
pub mod cli;
pub mod config;
pub mod domain;
pub mod logging;
pub mod pipeline;
