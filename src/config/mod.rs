//! Configuration management for Mantle.
//!
//! Mantle uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `MANTLE_*` environment variable overrides
//! - Default values for optional settings
//! - Comprehensive validation
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mantle::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("mantle.toml")?;
//! println!("Workers: {}", config.pipeline.worker_count);
//! println!("Compliance mode: {}", config.compliance.mode);
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! [salts]
//! global = "${MANTLE_SALT_GLOBAL}"
//! user = "${MANTLE_SALT_USER}"
//! organization = "${MANTLE_SALT_ORGANIZATION}"
//! assessment = "${MANTLE_SALT_ASSESSMENT}"
//! session = "${MANTLE_SALT_SESSION}"
//!
//! [compliance]
//! mode = "gdpr"
//! k_anonymity = 5
//!
//! [pipeline]
//! worker_count = 8
//! batch_size = 100
//! max_retries = 3
//! ```
//!
//! Salts are secrets: they are held in [`SecretString`] containers that
//! redact Debug output and zero memory on drop.

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{
    AlertThresholds, ApplicationConfig, ComplianceConfig, GeneralizationConfig, GeoGranularity,
    LoggingConfig, MantleConfig, PipelineConfig, RetentionConfig, SaltsConfig,
    TemporalGranularity,
};
pub use secret::{secret_string, SecretString, SecretValue};
