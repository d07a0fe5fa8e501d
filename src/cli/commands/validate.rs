//! Validate config command implementation
//!
//! Implements the `validate-config` command. Salts are never printed, only
//! whether they are set.

use crate::config::load_config;
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Compliance Mode: {}", config.compliance.mode);
        println!("  k-Anonymity: {}", config.compliance.k_anonymity);
        println!(
            "  Differential Privacy: {}",
            if config.compliance.differential_privacy {
                format!("enabled (epsilon = {})", config.compliance.epsilon)
            } else {
                "disabled".to_string()
            }
        );
        println!("  Temporal Granularity: {:?}", config.generalization.temporal);
        println!("  Workers: {}", config.pipeline.worker_count);
        println!("  Batch Size: {}", config.pipeline.batch_size);
        println!("  Max Retries: {}", config.pipeline.max_retries);
        println!(
            "  Quarantine Failures: {}",
            config.pipeline.quarantine_failures
        );
        println!("  Salts: all 5 domains {}", salt_status(&config));

        Ok(0)
    }
}

fn salt_status(config: &crate::config::MantleConfig) -> &'static str {
    use crate::anonymization::SaltDomain;
    let all_set = SaltDomain::all().iter().all(|d| {
        !config
            .salts
            .for_domain(*d)
            .expose_secret()
            .is_empty()
    });
    if all_set {
        "set (values redacted)"
    } else {
        "INCOMPLETE"
    }
}
