//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::MantleConfig;
use crate::anonymization::compliance::ComplianceMode;
use crate::config::secret::secret_string;
use crate::domain::errors::MantleError;
use crate::domain::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (`${VAR}` syntax)
/// 3. Parses the TOML into [`MantleConfig`]
/// 4. Applies environment variable overrides (`MANTLE_*` prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if the file cannot be read, TOML parsing fails, a
/// referenced environment variable is missing, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use mantle::config::load_config;
///
/// let config = load_config("mantle.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<MantleConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MantleError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        MantleError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: MantleConfig = toml::from_str(&contents)
        .map_err(|e| MantleError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        MantleError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format `${VAR_NAME}`
///
/// Comment lines are left untouched. Missing variables are collected and
/// reported together.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| MantleError::Configuration(e.to_string()))?;
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        let trimmed = line.trim_start();

        if trimmed.starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{var_name}}}");
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(MantleError::Configuration(format!(
            "Missing environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies `MANTLE_*` environment variable overrides
///
/// Overrides cover the knobs operators most often flip per deployment:
/// salts, compliance mode and thresholds, and pipeline sizing.
fn apply_env_overrides(config: &mut MantleConfig) -> Result<()> {
    if let Ok(val) = std::env::var("MANTLE_SALT_GLOBAL") {
        config.salts.global = secret_string(val);
    }
    if let Ok(val) = std::env::var("MANTLE_SALT_USER") {
        config.salts.user = secret_string(val);
    }
    if let Ok(val) = std::env::var("MANTLE_SALT_ORGANIZATION") {
        config.salts.organization = secret_string(val);
    }
    if let Ok(val) = std::env::var("MANTLE_SALT_ASSESSMENT") {
        config.salts.assessment = secret_string(val);
    }
    if let Ok(val) = std::env::var("MANTLE_SALT_SESSION") {
        config.salts.session = secret_string(val);
    }

    if let Ok(val) = std::env::var("MANTLE_COMPLIANCE_MODE") {
        config.compliance.mode = match val.to_lowercase().as_str() {
            "gdpr" => ComplianceMode::Gdpr,
            "hipaa" => ComplianceMode::Hipaa,
            "ccpa" => ComplianceMode::Ccpa,
            "strict" => ComplianceMode::Strict,
            _ => {
                return Err(MantleError::Configuration(format!(
                    "Invalid MANTLE_COMPLIANCE_MODE: {val}"
                )))
            }
        };
    }
    if let Ok(val) = std::env::var("MANTLE_K_ANONYMITY") {
        config.compliance.k_anonymity = parse_env("MANTLE_K_ANONYMITY", &val)?;
    }
    if let Ok(val) = std::env::var("MANTLE_EPSILON") {
        config.compliance.epsilon = parse_env("MANTLE_EPSILON", &val)?;
    }
    if let Ok(val) = std::env::var("MANTLE_DIFFERENTIAL_PRIVACY") {
        config.compliance.differential_privacy = parse_env("MANTLE_DIFFERENTIAL_PRIVACY", &val)?;
    }

    if let Ok(val) = std::env::var("MANTLE_WORKER_COUNT") {
        config.pipeline.worker_count = parse_env("MANTLE_WORKER_COUNT", &val)?;
    }
    if let Ok(val) = std::env::var("MANTLE_BATCH_SIZE") {
        config.pipeline.batch_size = parse_env("MANTLE_BATCH_SIZE", &val)?;
    }
    if let Ok(val) = std::env::var("MANTLE_MAX_RETRIES") {
        config.pipeline.max_retries = parse_env("MANTLE_MAX_RETRIES", &val)?;
    }
    if let Ok(val) = std::env::var("MANTLE_QUARANTINE_FAILURES") {
        config.pipeline.quarantine_failures = parse_env("MANTLE_QUARANTINE_FAILURES", &val)?;
    }

    Ok(())
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| MantleError::Configuration(format!("Invalid {name} value: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[salts]
global = "g-salt"
user = "u-salt"
organization = "o-salt"
assessment = "a-salt"
session = "s-salt"
"#;

    #[test]
    fn test_load_minimal_config() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MINIMAL_TOML.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.pipeline.worker_count, 4);
        assert_eq!(config.application.log_level, "info");
    }

    #[test]
    fn test_missing_file() {
        let result = load_config("/nonexistent/mantle.toml");
        assert!(matches!(result, Err(MantleError::Configuration(_))));
    }

    #[test]
    fn test_env_substitution_missing_var() {
        let toml = r#"
[salts]
global = "${MANTLE_TEST_SURELY_UNSET_VAR}"
user = "u"
organization = "o"
assessment = "a"
session = "s"
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        let result = load_config(file.path());
        assert!(result.is_err());
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("MANTLE_TEST_SURELY_UNSET_VAR"));
    }

    #[test]
    fn test_comments_skip_substitution() {
        let toml = format!("# reference ${{SOME_UNSET_VAR}} in a comment\n{MINIMAL_TOML}");
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        assert!(load_config(file.path()).is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let toml = format!("{MINIMAL_TOML}\n[pipeline]\nworker_count = 0\n");
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        let result = load_config(file.path());
        assert!(result.is_err());
    }
}
