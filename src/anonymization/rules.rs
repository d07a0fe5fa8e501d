//! PII rule engine for free-text fields
//!
//! Scans text against a fixed, ordered rule table and applies each rule's
//! action. Detection runs over the original text for every rule before any
//! replacement is applied, so a rule can never match another rule's marker.
//! Overlapping matches are resolved by rule order, not by specificity.

use crate::anonymization::hasher::{IdentityHasher, SaltDomain, INLINE_TOKEN_LEN};
use crate::domain::AnonymizationError;
use regex::Regex;
use std::sync::Arc;

/// Redaction marker for the Remove action
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Marker for the Generalize action; no value-specific detail is retained
pub const GENERALIZED_MARKER: &str = "[GENERALIZED]";

/// Rule sensitivity tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Sensitivity {
    Low,
    Medium,
    High,
    Critical,
}

/// What to do with a matched span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiiAction {
    /// Replace with [`REDACTION_MARKER`]
    Remove,
    /// Replace with `[HASH:<16-hex>]` via the global salt domain
    Hash,
    /// Keep first 2 and last 2 characters, `*` the interior
    Mask,
    /// Replace with [`GENERALIZED_MARKER`]
    Generalize,
}

/// A single detection rule
#[derive(Debug)]
pub struct PiiRule {
    pub name: &'static str,
    pub pattern: Regex,
    pub sensitivity: Sensitivity,
    pub action: PiiAction,
}

/// Result of sanitizing one text field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizeOutcome {
    /// Sanitized text
    pub clean: String,
    /// Total matches found
    pub detected: u32,
    /// Matches actually transformed. Equal to `detected` with the current
    /// rule table, but tracked separately so detect-only rules can be added
    /// without changing the contract.
    pub removed: u32,
}

/// Free-text sanitizer over the fixed rule table
///
/// Thread-safe; share via `Arc`. Rules are compiled once in the constructor;
/// a pattern failing to compile is a startup error.
pub struct Sanitizer {
    rules: Vec<PiiRule>,
    hasher: Arc<IdentityHasher>,
}

impl Sanitizer {
    /// Build the sanitizer with the built-in rule table
    pub fn new(hasher: Arc<IdentityHasher>) -> Result<Self, AnonymizationError> {
        Ok(Self {
            rules: builtin_rules()?,
            hasher,
        })
    }

    /// The rule table, in evaluation order
    pub fn rules(&self) -> &[PiiRule] {
        &self.rules
    }

    /// Scan `text` and apply each matched rule's action
    pub fn sanitize(&self, text: &str) -> Result<SanitizeOutcome, AnonymizationError> {
        if text.is_empty() {
            return Ok(SanitizeOutcome::default());
        }

        // Phase 1: detect against the original text only. Earlier rules win
        // overlaps; a span claimed by rule N is invisible to rule N+1.
        let mut matches: Vec<(usize, usize, usize)> = Vec::new(); // (start, end, rule index)
        for (rule_idx, rule) in self.rules.iter().enumerate() {
            for m in rule.pattern.find_iter(text) {
                let overlaps = matches
                    .iter()
                    .any(|&(start, end, _)| m.start() < end && start < m.end());
                if !overlaps {
                    matches.push((m.start(), m.end(), rule_idx));
                }
            }
        }

        let detected = matches.len() as u32;
        if matches.is_empty() {
            return Ok(SanitizeOutcome {
                clean: text.to_string(),
                detected: 0,
                removed: 0,
            });
        }

        // Phase 2: apply replacements back to front so offsets stay valid.
        matches.sort_by_key(|&(start, _, _)| std::cmp::Reverse(start));
        let mut clean = text.to_string();
        let mut removed = 0u32;
        for (start, end, rule_idx) in matches {
            let replacement = self.replacement(&text[start..end], self.rules[rule_idx].action)?;
            clean.replace_range(start..end, &replacement);
            removed += 1;
        }

        Ok(SanitizeOutcome {
            clean,
            detected,
            removed,
        })
    }

    fn replacement(&self, matched: &str, action: PiiAction) -> Result<String, AnonymizationError> {
        Ok(match action {
            PiiAction::Remove => REDACTION_MARKER.to_string(),
            PiiAction::Hash => {
                let token =
                    self.hasher
                        .hash_with_len(matched, SaltDomain::Global, INLINE_TOKEN_LEN)?;
                format!("[HASH:{token}]")
            }
            PiiAction::Mask => mask(matched),
            PiiAction::Generalize => GENERALIZED_MARKER.to_string(),
        })
    }
}

/// Mask a value, keeping the first 2 and last 2 characters
///
/// Values of 4 characters or fewer are fully masked.
fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let mut out = String::with_capacity(chars.len());
    out.extend(&chars[..2]);
    out.extend(std::iter::repeat('*').take(chars.len() - 4));
    out.extend(&chars[chars.len() - 2..]);
    out
}

/// The fixed rule table, in evaluation order
fn builtin_rules() -> Result<Vec<PiiRule>, AnonymizationError> {
    let defs: [(&'static str, &'static str, Sensitivity, PiiAction); 10] = [
        (
            "email",
            r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
            Sensitivity::High,
            PiiAction::Hash,
        ),
        (
            "phone",
            r"\(?\b\d{3}\)?[-.\s]\d{3}[-.\s]?\d{4}\b",
            Sensitivity::High,
            PiiAction::Remove,
        ),
        (
            "ssn",
            r"\b\d{3}-\d{2}-\d{4}\b",
            Sensitivity::Critical,
            PiiAction::Remove,
        ),
        (
            "credit_card",
            r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b",
            Sensitivity::Critical,
            PiiAction::Remove,
        ),
        (
            "ip_address",
            r"\b(?:\d{1,3}\.){3}\d{1,3}\b",
            Sensitivity::Medium,
            PiiAction::Hash,
        ),
        (
            "full_name",
            r"\b[A-Z][a-z]{1,20} [A-Z][a-z]{1,20}\b",
            Sensitivity::High,
            PiiAction::Mask,
        ),
        (
            "postal_code",
            r"\b\d{5}(?:-\d{4})?\b",
            Sensitivity::Medium,
            PiiAction::Generalize,
        ),
        (
            "pii_url",
            r"https?://[^\s]*(?:user|uid|email|token|account)=[^\s]+",
            Sensitivity::High,
            PiiAction::Remove,
        ),
        (
            "date_of_birth",
            r"\b(?:19|20)\d{2}[-/](?:0?[1-9]|1[0-2])[-/](?:0?[1-9]|[12]\d|3[01])\b",
            Sensitivity::Medium,
            PiiAction::Generalize,
        ),
        (
            "government_id",
            r"\b[A-Z]{2}\d{6,9}\b",
            Sensitivity::High,
            PiiAction::Hash,
        ),
    ];

    defs.into_iter()
        .map(|(name, pattern, sensitivity, action)| {
            let pattern =
                Regex::new(pattern).map_err(|e| AnonymizationError::InvalidPattern {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?;
            Ok(PiiRule {
                name,
                pattern,
                sensitivity,
                action,
            })
        })
        .collect()
}
