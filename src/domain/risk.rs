//! Re-identification risk model

use serde::{Deserialize, Serialize};

/// A single contributing factor to the overall risk score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFactor {
    /// Short name of the factor, e.g. "quasi_identifier_count"
    pub factor: String,
    /// How many points this factor contributed
    pub impact: u8,
    /// Suggested mitigation
    pub mitigation: String,
}

/// Result of assessing a single anonymized record
///
/// Computed once per record; `overall_risk` is embedded into the record's
/// metadata as its risk score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReIdentificationRisk {
    /// Aggregate risk, clamped to 0-100
    pub overall_risk: u8,
    /// Quasi-identifier fields found populated in the output
    pub quasi_identifiers: Vec<String>,
    /// Sensitive attribute fields found in the output
    pub sensitive_attributes: Vec<String>,
    /// Individual contributing factors
    pub risk_factors: Vec<RiskFactor>,
    /// Tiered textual recommendations
    pub recommendations: Vec<String>,
}

impl ReIdentificationRisk {
    /// An empty assessment with zero risk
    pub fn none() -> Self {
        Self {
            overall_risk: 0,
            quasi_identifiers: Vec::new(),
            sensitive_attributes: Vec::new(),
            risk_factors: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}
