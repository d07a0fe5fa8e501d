//! Anonymized output records
//!
//! [`AnonymizedData`] is what the engine produces and the pipeline ships to
//! storage: the anonymized payload plus quality/risk metadata. The original
//! content digest is kept only for idempotent-write detection upstream and is
//! never usable for re-identification.

use crate::domain::record::EntityKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema version stamped into every anonymized record
pub const ANONYMIZATION_VERSION: &str = "2.0";

/// Metadata attached to every anonymized record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymizationMetadata {
    /// When the record was anonymized
    pub anonymized_at: DateTime<Utc>,
    /// Transform method label, e.g. "user_v2"
    pub method: String,
    /// Schema version of the anonymization output
    pub version: String,
    /// Compliance flags raised by the validator (empty when clean)
    pub compliance_flags: Vec<String>,
    /// Data quality score, 0-100
    pub data_quality: u8,
    /// Re-identification risk score, 0-100
    pub risk_score: u8,
}

/// An anonymized record ready for the analytics store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymizedData {
    /// Irreversible token for the entity's primary key
    pub id: String,
    /// Entity kind, used to route storage writes
    pub kind: EntityKind,
    /// SHA-256 digest of the canonicalized raw input.
    /// Used only for idempotent-write detection, never for re-identification.
    pub original_data_hash: String,
    /// The anonymized field map
    pub data: Map<String, Value>,
    /// Quality and risk metadata
    pub metadata: AnonymizationMetadata,
}

impl AnonymizedData {
    /// Create a new anonymized record with metadata stamped now
    pub fn new(
        id: String,
        kind: EntityKind,
        original_data_hash: String,
        data: Map<String, Value>,
        compliance_flags: Vec<String>,
        data_quality: u8,
        risk_score: u8,
    ) -> Self {
        Self {
            id,
            kind,
            original_data_hash,
            data,
            metadata: AnonymizationMetadata {
                anonymized_at: Utc::now(),
                method: format!("{}_v{}", kind.as_str(), ANONYMIZATION_VERSION),
                version: ANONYMIZATION_VERSION.to_string(),
                compliance_flags,
                data_quality: data_quality.min(100),
                risk_score: risk_score.min(100),
            },
        }
    }

    /// Whether the validator raised any hard violation
    pub fn has_violation(&self) -> bool {
        self.metadata
            .compliance_flags
            .iter()
            .any(|f| f.contains("_VIOLATION"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> AnonymizedData {
        let mut data = Map::new();
        data.insert("user_hash".to_string(), json!("abc123"));
        AnonymizedData::new(
            "abc123".to_string(),
            EntityKind::User,
            "deadbeef".to_string(),
            data,
            vec![],
            95,
            20,
        )
    }

    #[test]
    fn test_metadata_stamping() {
        let record = sample();
        assert_eq!(record.metadata.method, "user_v2.0");
        assert_eq!(record.metadata.version, ANONYMIZATION_VERSION);
        assert_eq!(record.metadata.data_quality, 95);
    }

    #[test]
    fn test_scores_clamped_to_100() {
        let record = AnonymizedData::new(
            "x".to_string(),
            EntityKind::Event,
            "y".to_string(),
            Map::new(),
            vec![],
            200,
            150,
        );
        assert_eq!(record.metadata.data_quality, 100);
        assert_eq!(record.metadata.risk_score, 100);
    }

    #[test]
    fn test_violation_detection() {
        let mut record = sample();
        assert!(!record.has_violation());
        record
            .metadata
            .compliance_flags
            .push("GDPR_VIOLATION:direct_identifier:email".to_string());
        assert!(record.has_violation());
    }
}
