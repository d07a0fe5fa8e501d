//! Configuration schema types
//!
//! This module defines the configuration structure for Mantle. The root
//! [`MantleConfig`] maps to the TOML file; it is immutable after loading and
//! shared read-only across workers via `Arc`.

use crate::anonymization::compliance::ComplianceMode;
use crate::anonymization::hasher::SaltDomain;
use crate::config::secret::{secret_string, SecretString};
use serde::{Deserialize, Serialize};

/// Main Mantle configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MantleConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Per-domain hashing salts
    pub salts: SaltsConfig,

    /// Compliance mode and privacy thresholds
    #[serde(default)]
    pub compliance: ComplianceConfig,

    /// Generalization granularities
    #[serde(default)]
    pub generalization: GeneralizationConfig,

    /// Retention windows
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Pipeline performance and reliability knobs
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MantleConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value found.
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.salts.validate()?;
        self.compliance.validate()?;
        self.generalization.validate()?;
        self.retention.validate()?;
        self.pipeline.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// A complete configuration with fixed salts, for tests and examples
    pub fn for_tests() -> Self {
        Self {
            application: ApplicationConfig::default(),
            salts: SaltsConfig::for_tests(),
            compliance: ComplianceConfig::default(),
            generalization: GeneralizationConfig::default(),
            retention: RetentionConfig::default(),
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// Per-domain hashing salts
///
/// Each identifier namespace gets its own base salt. Values are secret:
/// Debug output is redacted and memory is zeroed on drop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaltsConfig {
    pub global: SecretString,
    pub user: SecretString,
    pub organization: SecretString,
    pub assessment: SecretString,
    pub session: SecretString,
}

impl SaltsConfig {
    /// The base salt for a domain
    pub fn for_domain(&self, domain: SaltDomain) -> &SecretString {
        match domain {
            SaltDomain::Global => &self.global,
            SaltDomain::User => &self.user,
            SaltDomain::Organization => &self.organization,
            SaltDomain::Assessment => &self.assessment,
            SaltDomain::Session => &self.session,
        }
    }

    fn validate(&self) -> Result<(), String> {
        use secrecy::ExposeSecret;
        for domain in SaltDomain::all() {
            if self.for_domain(domain).expose_secret().is_empty() {
                return Err(format!("Salt for domain '{}' is empty", domain.label()));
            }
        }
        Ok(())
    }

    /// Fixed salts for tests and examples. Never use in production.
    pub fn for_tests() -> Self {
        Self {
            global: secret_string("test-salt-global"),
            user: secret_string("test-salt-user"),
            organization: secret_string("test-salt-organization"),
            assessment: secret_string("test-salt-assessment"),
            session: secret_string("test-salt-session"),
        }
    }

    /// Every domain sharing one base salt, for misconfiguration tests
    pub fn uniform_for_tests(salt: &str) -> Self {
        Self {
            global: secret_string(salt),
            user: secret_string(salt),
            organization: secret_string(salt),
            assessment: secret_string(salt),
            session: secret_string(salt),
        }
    }
}

/// Compliance mode and privacy thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceConfig {
    /// Regulation rule set to validate against
    #[serde(default)]
    pub mode: ComplianceMode,

    /// Minimum group size for quasi-identifier combinations
    #[serde(default = "default_k_anonymity")]
    pub k_anonymity: u32,

    /// Minimum distinct sensitive values per k-anonymous group
    #[serde(default = "default_l_diversity")]
    pub l_diversity: u32,

    /// Maximum distributional distance for sensitive attributes
    #[serde(default = "default_t_closeness")]
    pub t_closeness: f64,

    /// Enable Laplace noise on numeric timing fields
    #[serde(default)]
    pub differential_privacy: bool,

    /// Privacy budget for the Laplace mechanism
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            mode: ComplianceMode::default(),
            k_anonymity: default_k_anonymity(),
            l_diversity: default_l_diversity(),
            t_closeness: default_t_closeness(),
            differential_privacy: false,
            epsilon: default_epsilon(),
        }
    }
}

impl ComplianceConfig {
    fn validate(&self) -> Result<(), String> {
        if self.k_anonymity == 0 {
            return Err("k_anonymity must be at least 1".to_string());
        }
        if self.l_diversity == 0 {
            return Err("l_diversity must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.t_closeness) {
            return Err("t_closeness must be in [0.0, 1.0]".to_string());
        }
        if self.differential_privacy && self.epsilon <= 0.0 {
            return Err("epsilon must be positive when differential_privacy is enabled".to_string());
        }
        Ok(())
    }
}

/// Temporal generalization granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemporalGranularity {
    /// Truncate timestamps to the day
    Day,
    /// Truncate timestamps to the ISO week start (Monday)
    #[default]
    Week,
    /// Truncate timestamps to the first of the month
    Month,
}

/// Geographic generalization granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeoGranularity {
    /// Keep the country code
    Country,
    /// Collapse countries into coarse regions
    #[default]
    Region,
}

/// Generalization granularities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralizationConfig {
    #[serde(default)]
    pub temporal: TemporalGranularity,

    #[serde(default)]
    pub geographic: GeoGranularity,

    /// Time-spent values are rounded to the nearest multiple of this
    #[serde(default = "default_time_rounding_minutes")]
    pub time_rounding_minutes: u32,
}

impl Default for GeneralizationConfig {
    fn default() -> Self {
        Self {
            temporal: TemporalGranularity::default(),
            geographic: GeoGranularity::default(),
            time_rounding_minutes: default_time_rounding_minutes(),
        }
    }
}

impl GeneralizationConfig {
    fn validate(&self) -> Result<(), String> {
        if self.time_rounding_minutes == 0 {
            return Err("time_rounding_minutes must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Retention windows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// How long anonymized records are kept, in days
    #[serde(default = "default_anonymized_retention_days")]
    pub anonymized_days: u32,

    /// How long quarantined requests are kept, in days
    #[serde(default = "default_quarantine_retention_days")]
    pub quarantine_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            anonymized_days: default_anonymized_retention_days(),
            quarantine_days: default_quarantine_retention_days(),
        }
    }
}

impl RetentionConfig {
    fn validate(&self) -> Result<(), String> {
        if self.quarantine_days == 0 {
            return Err("quarantine_days must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Alert thresholds checked on every metrics tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Maximum tolerated error rate before a performance alert
    #[serde(default = "default_max_error_rate")]
    pub max_error_rate: f64,

    /// Maximum tolerated average processing latency in milliseconds
    #[serde(default = "default_max_avg_latency_ms")]
    pub max_avg_latency_ms: f64,

    /// Maximum tolerated input queue depth
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: usize,

    /// Maximum tolerated resident memory in bytes; 0 disables the check
    #[serde(default = "default_max_memory_bytes")]
    pub max_memory_bytes: u64,

    /// Per-record quality floor; lower emits a quality alert
    #[serde(default = "default_min_quality")]
    pub min_quality: u8,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            max_error_rate: default_max_error_rate(),
            max_avg_latency_ms: default_max_avg_latency_ms(),
            max_queue_depth: default_max_queue_depth(),
            max_memory_bytes: default_max_memory_bytes(),
            min_quality: default_min_quality(),
        }
    }
}

/// Pipeline performance and reliability knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Requests dispatched per cycle (1-5000)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Worker pool size (1-64)
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Dispatch/flush cycle interval in milliseconds
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Metrics recomputation interval in milliseconds
    #[serde(default = "default_metrics_interval_ms")]
    pub metrics_interval_ms: u64,

    /// Per-request completion timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries before a request is quarantined
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base retry backoff; doubled per retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Output buffer length that triggers an early flush
    #[serde(default = "default_output_buffer_size")]
    pub output_buffer_size: usize,

    /// Persist exhausted requests to the quarantine sink
    #[serde(default = "default_true")]
    pub quarantine_failures: bool,

    /// Replace a worker that panics instead of degrading the pool
    #[serde(default = "default_true")]
    pub restart_on_error: bool,

    /// Fraction of records run through the compliance validator
    #[serde(default = "default_validation_sample_rate")]
    pub validation_sample_rate: f64,

    /// Alert thresholds
    #[serde(default)]
    pub alerts: AlertThresholds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            worker_count: default_worker_count(),
            flush_interval_ms: default_flush_interval_ms(),
            metrics_interval_ms: default_metrics_interval_ms(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            output_buffer_size: default_output_buffer_size(),
            quarantine_failures: true,
            restart_on_error: true,
            validation_sample_rate: default_validation_sample_rate(),
            alerts: AlertThresholds::default(),
        }
    }
}

impl PipelineConfig {
    fn validate(&self) -> Result<(), String> {
        if !(1..=5000).contains(&self.batch_size) {
            return Err(format!(
                "batch_size must be between 1 and 5000, got {}",
                self.batch_size
            ));
        }
        if !(1..=64).contains(&self.worker_count) {
            return Err(format!(
                "worker_count must be between 1 and 64, got {}",
                self.worker_count
            ));
        }
        if self.flush_interval_ms == 0 {
            return Err("flush_interval_ms must be positive".to_string());
        }
        if self.metrics_interval_ms == 0 {
            return Err("metrics_interval_ms must be positive".to_string());
        }
        if self.timeout_ms == 0 {
            return Err("timeout_ms must be positive".to_string());
        }
        if self.output_buffer_size == 0 {
            return Err("output_buffer_size must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.validation_sample_rate) {
            return Err("validation_sample_rate must be in [0.0, 1.0]".to_string());
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable JSON file logging
    #[serde(default)]
    pub file_enabled: bool,

    /// Directory for log files
    #[serde(default = "default_log_path")]
    pub file_path: String,

    /// Rotation policy: "daily" or "hourly"
    #[serde(default = "default_log_rotation")]
    pub file_rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_enabled: false,
            file_path: default_log_path(),
            file_rotation: default_log_rotation(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        if self.file_enabled && self.file_path.is_empty() {
            return Err("file_path must be set when file logging is enabled".to_string());
        }
        if !["daily", "hourly"].contains(&self.file_rotation.as_str()) {
            return Err(format!(
                "Invalid file_rotation '{}'. Must be 'daily' or 'hourly'",
                self.file_rotation
            ));
        }
        Ok(())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_k_anonymity() -> u32 {
    5
}

fn default_l_diversity() -> u32 {
    2
}

fn default_t_closeness() -> f64 {
    0.2
}

fn default_epsilon() -> f64 {
    1.0
}

fn default_time_rounding_minutes() -> u32 {
    5
}

fn default_anonymized_retention_days() -> u32 {
    730
}

fn default_quarantine_retention_days() -> u32 {
    30
}

fn default_batch_size() -> usize {
    50
}

fn default_worker_count() -> usize {
    4
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn default_metrics_interval_ms() -> u64 {
    5000
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    250
}

fn default_output_buffer_size() -> usize {
    100
}

fn default_validation_sample_rate() -> f64 {
    1.0
}

fn default_max_error_rate() -> f64 {
    0.05
}

fn default_max_avg_latency_ms() -> f64 {
    500.0
}

fn default_max_queue_depth() -> usize {
    1000
}

fn default_max_memory_bytes() -> u64 {
    1_073_741_824
}

fn default_min_quality() -> u8 {
    60
}

fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "logs".to_string()
}

fn default_log_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MantleConfig::for_tests();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_salt_rejected() {
        let mut config = MantleConfig::for_tests();
        config.salts = SaltsConfig::uniform_for_tests("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_k_anonymity_rejected() {
        let mut config = MantleConfig::for_tests();
        config.compliance.k_anonymity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_worker_count_bounds() {
        let mut config = MantleConfig::for_tests();
        config.pipeline.worker_count = 0;
        assert!(config.validate().is_err());
        config.pipeline.worker_count = 65;
        assert!(config.validate().is_err());
        config.pipeline.worker_count = 8;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_epsilon_required_for_dp() {
        let mut config = MantleConfig::for_tests();
        config.compliance.differential_privacy = true;
        config.compliance.epsilon = 0.0;
        assert!(config.validate().is_err());
        config.compliance.epsilon = 0.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_roundtrip_with_defaults() {
        let toml_str = r#"
            [salts]
            global = "g"
            user = "u"
            organization = "o"
            assessment = "a"
            session = "s"
        "#;
        let config: MantleConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.pipeline.worker_count, 4);
        assert_eq!(config.compliance.k_anonymity, 5);
        assert!(config.validate().is_ok());
    }
}
