//! Compliance modes and output validation
//!
//! The validator is an advisory linter over the engine's own output, not a
//! proof of compliance: it scans anonymized field names and values for
//! residual direct identifiers, indirect identifiers, and (under HIPAA) the
//! 18 Safe Harbor identifier categories, and applies a simplified
//! k-anonymity heuristic over quasi-identifier field counts.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Regulation rule set to validate against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceMode {
    /// GDPR (European Union)
    #[default]
    Gdpr,
    /// HIPAA Safe Harbor (United States)
    Hipaa,
    /// CCPA (California)
    Ccpa,
    /// Union of all rule sets; violations reject the record
    Strict,
}

impl ComplianceMode {
    /// Prefix used in violation flags, e.g. `GDPR_VIOLATION:...`
    pub fn flag_prefix(&self) -> &'static str {
        match self {
            Self::Gdpr => "GDPR",
            Self::Hipaa => "HIPAA",
            Self::Ccpa => "CCPA",
            Self::Strict => "STRICT",
        }
    }
}

impl fmt::Display for ComplianceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Gdpr => "gdpr",
            Self::Hipaa => "hipaa",
            Self::Ccpa => "ccpa",
            Self::Strict => "strict",
        };
        write!(f, "{s}")
    }
}

/// Key fragments that indicate a residual direct identifier
const DIRECT_IDENTIFIER_KEYS: &[&str] = &["name", "email", "phone", "ssn", "address"];

/// Key fragments that indicate an indirect identifier
const INDIRECT_IDENTIFIER_KEYS: &[&str] = &["zip", "postal", "birth", "age", "salary", "ip"];

/// HIPAA Safe Harbor identifier keywords (45 CFR 164.514(b)(2)), keyed by
/// the substrings we can check for in field names
const HIPAA_SAFE_HARBOR_KEYS: &[&str] = &[
    "name",
    "geographic",
    "street",
    "city",
    "county",
    "zip",
    "date",
    "birth",
    "admission",
    "discharge",
    "death",
    "phone",
    "fax",
    "email",
    "ssn",
    "social_security",
    "medical_record",
    "health_plan",
    "account",
    "certificate",
    "license",
    "vehicle",
    "vin",
    "device_serial",
    "url",
    "ip",
    "biometric",
    "fingerprint",
    "voiceprint",
    "photo",
    "face",
];

/// Validate an anonymized field map against the configured mode
///
/// Nested objects and arrays of objects (event properties, response answers)
/// are flattened with dotted paths so residual identifiers cannot hide one
/// level down. Returns advisory flags; an empty vector means no findings.
/// Hard findings carry a `*_VIOLATION` prefix; soft findings carry
/// `*_WARNING`.
pub fn validate(data: &Map<String, Value>, mode: ComplianceMode) -> Vec<String> {
    let prefix = mode.flag_prefix();
    let mut flags = Vec::new();

    let mut leaves = Vec::new();
    flatten("", data, &mut leaves);

    for (path, value) in &leaves {
        let leaf = leaf_key(path);

        if is_direct_identifier_key(&leaf) && !value_is_anonymized(value) {
            flags.push(format!("{prefix}_VIOLATION:direct_identifier:{path}"));
        } else if INDIRECT_IDENTIFIER_KEYS
            .iter()
            .any(|frag| key_contains_fragment(&leaf, frag))
            && !value_is_anonymized(value)
        {
            flags.push(format!("{prefix}_WARNING:indirect_identifier:{path}"));
        }
    }

    if matches!(mode, ComplianceMode::Hipaa | ComplianceMode::Strict) {
        for (path, value) in &leaves {
            let leaf = leaf_key(path);
            if key_ends_with_hash(&leaf) || value_is_anonymized(value) {
                continue;
            }
            if HIPAA_SAFE_HARBOR_KEYS
                .iter()
                .any(|frag| key_contains_fragment(&leaf, frag))
                && !flags.iter().any(|f| f.ends_with(&format!(":{path}")))
            {
                flags.push(format!("{prefix}_WARNING:safe_harbor_identifier:{path}"));
            }
        }
    }

    // Simplified k-anonymity heuristic: too many populated quasi-identifier
    // fields in one record narrows the group it can belong to.
    let quasi_count = data
        .keys()
        .filter(|k| {
            let k = k.to_lowercase();
            k.ends_with("_category") || k.ends_with("_region") || k == "region" || k.ends_with("_type")
        })
        .count();
    if quasi_count > 3 {
        flags.push(format!(
            "{prefix}_WARNING:k_anonymity_heuristic:quasi_identifier_fields={quasi_count}"
        ));
    }

    flags
}

/// Collect scalar leaves with dotted key paths
fn flatten<'a>(prefix: &str, map: &'a Map<String, Value>, out: &mut Vec<(String, &'a Value)>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => flatten(&path, nested, out),
            Value::Array(items) => {
                let mut scalar_array = true;
                for item in items {
                    if let Value::Object(nested) = item {
                        flatten(&path, nested, out);
                        scalar_array = false;
                    }
                }
                if scalar_array {
                    out.push((path, value));
                }
            }
            _ => out.push((path, value)),
        }
    }
}

fn leaf_key(path: &str) -> String {
    path.rsplit('.').next().unwrap_or(path).to_lowercase()
}

fn is_direct_identifier_key(key_lower: &str) -> bool {
    if DIRECT_IDENTIFIER_KEYS
        .iter()
        .any(|frag| key_contains_fragment(key_lower, frag))
    {
        return true;
    }
    // id-like keys: "id", "user_id", ... but not the hash fields the engine
    // itself emits ("user_hash" etc.)
    key_lower == "id" || (key_lower.ends_with("_id") && !key_lower.ends_with("_hash"))
}

/// Fragment match on `_`-separated key parts, so "ip" does not fire on
/// "description" or "zip" on "zipline_score"
fn key_contains_fragment(key_lower: &str, fragment: &str) -> bool {
    key_lower.split('_').any(|part| part == fragment)
        || (fragment.len() > 3 && key_lower.contains(fragment))
}

fn key_ends_with_hash(key_lower: &str) -> bool {
    key_lower.ends_with("_hash") || key_lower == "hash"
}

/// Whether a value already looks like engine output: a hex token, an inline
/// marker, or a closed-set category label
fn value_is_anonymized(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => {
            looks_like_token(s)
                || s.starts_with("[HASH:")
                || s == "[REDACTED]"
                || s == "[GENERALIZED]"
                || looks_like_category(s)
        }
        // Numbers, booleans, and nested structures are not direct identifiers
        _ => true,
    }
}

fn looks_like_token(s: &str) -> bool {
    (s.len() == 64 || s.len() == 16) && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Closed-set category labels are ALL_CAPS with underscores
fn looks_like_category(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_uppercase() || c == '_' || c.is_ascii_digit())
}
