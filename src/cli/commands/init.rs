//! Init command implementation
//!
//! Writes a starter configuration file with salts referenced from the
//! environment, never inline.

use clap::Args;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Output path for the configuration file
    #[arg(short, long, default_value = "mantle.toml")]
    pub output: String,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TEMPLATE: &str = r#"# Mantle configuration
#
# Salts are secrets. Keep them in the environment (or a secret manager),
# never in this file. Changing a salt breaks referential integrity with
# previously anonymized data.

[application]
log_level = "info"

[salts]
global = "${MANTLE_SALT_GLOBAL}"
user = "${MANTLE_SALT_USER}"
organization = "${MANTLE_SALT_ORGANIZATION}"
assessment = "${MANTLE_SALT_ASSESSMENT}"
session = "${MANTLE_SALT_SESSION}"

[compliance]
mode = "gdpr"            # gdpr, hipaa, ccpa, strict
k_anonymity = 5
differential_privacy = false
epsilon = 1.0

[generalization]
temporal = "week"        # day, week, month
geographic = "region"    # country, region
time_rounding_minutes = 5

[pipeline]
worker_count = 4
batch_size = 50
max_retries = 3
retry_backoff_ms = 250
quarantine_failures = true

[pipeline.alerts]
max_error_rate = 0.05
max_avg_latency_ms = 500.0
max_queue_depth = 1000
max_memory_bytes = 1073741824   # 0 disables the memory alert
min_quality = 60

[logging]
file_enabled = false
file_path = "logs"
file_rotation = "daily"
"#;

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        let path = Path::new(&self.output);
        if path.exists() && !self.force {
            println!("❌ {} already exists (use --force to overwrite)", self.output);
            return Ok(2);
        }

        tokio::fs::write(path, CONFIG_TEMPLATE).await?;
        println!("✅ Wrote {}", self.output);
        println!();
        println!("Next steps:");
        println!("  1. Export the five MANTLE_SALT_* environment variables");
        println!("  2. Run: mantle validate-config --config {}", self.output);
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mantle.toml");
        std::fs::write(&path, "existing").unwrap();

        let args = InitArgs {
            output: path.to_string_lossy().to_string(),
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "existing");
    }

    #[tokio::test]
    async fn test_init_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mantle.toml");
        let args = InitArgs {
            output: path.to_string_lossy().to_string(),
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), 0);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("${MANTLE_SALT_GLOBAL}"));
        assert!(content.contains("[pipeline]"));
    }
}
