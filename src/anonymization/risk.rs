//! Re-identification risk scoring
//!
//! Scores each anonymized record on a 0-100 scale from the quasi-identifiers
//! it still carries, how rare its quasi-identifier combination is among
//! records seen by this engine instance, and whether temporal fields could be
//! correlated with external data.
//!
//! Combination rarity is tracked in memory per engine instance: the assessor
//! hashes the (industry, size, region) triple and counts occurrences. A
//! combination seen fewer than `k_anonymity` times is flagged as rare. This
//! is an approximation of a true k-anonymity query over the output store,
//! which would need storage access the engine does not have.

use crate::domain::{ReIdentificationRisk, RiskFactor};
use serde_json::{Map, Value};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

/// Output field names treated as quasi-identifiers when present
const QUASI_IDENTIFIER_FIELDS: &[&str] = &[
    "region",
    "industry_category",
    "size_category",
    "role_category",
    "plan_category",
    "device_category",
    "browser_category",
    "signup_period",
    "created_period",
];

/// Output field names treated as sensitive attributes
const SENSITIVE_FIELDS: &[&str] = &["answers", "score", "value", "event_type", "properties"];

/// Risk assessor with per-instance combination frequency tracking
///
/// Thread-safe; share via `Arc`. The frequency map grows with the number of
/// distinct quasi-identifier combinations, which is bounded by the closed
/// category sets and stays small in practice.
pub struct RiskAssessor {
    k_anonymity: u32,
    combination_counts: Mutex<HashMap<u64, u64>>,
}

impl RiskAssessor {
    pub fn new(k_anonymity: u32) -> Self {
        Self {
            k_anonymity,
            combination_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Assess an anonymized field map
    ///
    /// Also records the record's quasi-identifier combination, so the rarity
    /// signal sharpens as more records flow through the same instance.
    pub fn assess(&self, data: &Map<String, Value>) -> ReIdentificationRisk {
        let quasi_identifiers: Vec<String> = QUASI_IDENTIFIER_FIELDS
            .iter()
            .filter(|f| field_populated(data, f))
            .map(|f| f.to_string())
            .collect();

        let sensitive_attributes: Vec<String> = SENSITIVE_FIELDS
            .iter()
            .filter(|f| field_populated(data, f))
            .map(|f| f.to_string())
            .collect();

        let mut score: u32 = 0;
        let mut risk_factors = Vec::new();

        if quasi_identifiers.len() >= 3 {
            score += 25;
            risk_factors.push(RiskFactor {
                factor: format!(
                    "record carries {} quasi-identifiers",
                    quasi_identifiers.len()
                ),
                impact: 25,
                mitigation: "coarsen generalization granularity".to_string(),
            });
        }
        if quasi_identifiers.len() >= 5 {
            score += 15;
            risk_factors.push(RiskFactor {
                factor: "high quasi-identifier density".to_string(),
                impact: 15,
                mitigation: "suppress low-value categorical fields".to_string(),
            });
        }

        if let Some(seen) = self.observe_combination(data) {
            if seen < u64::from(self.k_anonymity) {
                score += 30;
                risk_factors.push(RiskFactor {
                    factor: format!(
                        "quasi-identifier combination seen {seen} time(s), below k={}",
                        self.k_anonymity
                    ),
                    impact: 30,
                    mitigation: "widen size or industry bands for this combination".to_string(),
                });
            }
        }

        if has_temporal_correlation(data) {
            score += 10;
            risk_factors.push(RiskFactor {
                factor: "multiple temporal fields allow timeline correlation".to_string(),
                impact: 10,
                mitigation: "reduce temporal granularity to month".to_string(),
            });
        }

        let overall_risk = score.min(100) as u8;

        ReIdentificationRisk {
            overall_risk,
            recommendations: recommendations_for(overall_risk),
            quasi_identifiers,
            sensitive_attributes,
            risk_factors,
        }
    }

    /// Count this record's (industry, size, region) combination and return
    /// the updated count, or None when the record has no such fields
    fn observe_combination(&self, data: &Map<String, Value>) -> Option<u64> {
        let industry = string_field(data, "industry_category");
        let size = string_field(data, "size_category");
        let region = string_field(data, "region");
        if industry.is_none() && size.is_none() && region.is_none() {
            return None;
        }

        let mut hasher = DefaultHasher::new();
        industry.hash(&mut hasher);
        size.hash(&mut hasher);
        region.hash(&mut hasher);
        let key = hasher.finish();

        // A poisoned lock only loses the rarity signal, never the record.
        let mut counts = match self.combination_counts.lock() {
            Ok(counts) => counts,
            Err(_) => return None,
        };
        let count = counts.entry(key).or_insert(0);
        *count += 1;
        Some(*count)
    }
}

fn field_populated(data: &Map<String, Value>, field: &str) -> bool {
    match data.get(field) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(_) => true,
    }
}

fn string_field<'a>(data: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    data.get(field).and_then(Value::as_str)
}

/// Two or more period/timestamp fields let an observer line the record up
/// against external event timelines
fn has_temporal_correlation(data: &Map<String, Value>) -> bool {
    let temporal_fields = data
        .keys()
        .filter(|k| k.ends_with("_period") || k.ends_with("_at") || k.ends_with("_date"))
        .filter(|k| field_populated(data, k))
        .count();
    temporal_fields >= 2
}

fn recommendations_for(overall_risk: u8) -> Vec<String> {
    if overall_risk > 70 {
        vec![
            "suppress this record or coarsen all quasi-identifiers before release".to_string(),
            "re-run with month-level temporal granularity".to_string(),
        ]
    } else if overall_risk >= 40 {
        vec!["review quasi-identifier granularity before wide release".to_string()]
    } else {
        vec!["no action required".to_string()]
    }
}
