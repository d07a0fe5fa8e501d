//! Entity records flowing into the anonymization pipeline
//!
//! The pipeline accepts a tagged union over the five supported entity kinds.
//! Each variant carries its own strongly typed fields; the engine dispatches
//! on the tag rather than sniffing field presence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five entity kinds the engine knows how to anonymize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// End-user profile
    User,
    /// Customer organization
    Organization,
    /// Assessment definition
    Assessment,
    /// A user's submitted assessment response
    Response,
    /// Behavioral/telemetry event
    Event,
}

impl EntityKind {
    /// Stable lowercase label, used for storage routing and logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Organization => "organization",
            Self::Assessment => "assessment",
            Self::Response => "response",
            Self::Event => "event",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A record submitted for anonymization
///
/// Serialized with an explicit `kind` tag so streamed feeds (CDC adapters,
/// NDJSON files) can carry mixed entity kinds on one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityRecord {
    User(UserRecord),
    Organization(OrganizationRecord),
    Assessment(AssessmentRecord),
    Response(ResponseRecord),
    Event(EventRecord),
}

impl EntityRecord {
    /// The entity kind tag
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::User(_) => EntityKind::User,
            Self::Organization(_) => EntityKind::Organization,
            Self::Assessment(_) => EntityKind::Assessment,
            Self::Response(_) => EntityKind::Response,
            Self::Event(_) => EntityKind::Event,
        }
    }

    /// The record's raw primary key
    pub fn id(&self) -> &str {
        match self {
            Self::User(r) => &r.id,
            Self::Organization(r) => &r.id,
            Self::Assessment(r) => &r.id,
            Self::Response(r) => &r.id,
            Self::Event(r) => &r.id,
        }
    }
}

/// Raw user profile record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    /// Headcount of the user's organization, used for size banding
    #[serde(default)]
    pub organization_size: Option<u64>,
    /// ISO country code or free-form country name
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
    /// Free text, scanned for PII
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Raw organization record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
    /// Free text, scanned for PII
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Raw assessment definition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub id: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub creator_id: Option<String>,
    /// Free text, scanned for PII
    #[serde(default)]
    pub title: Option<String>,
    /// Free text, scanned for PII
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assessment_type: Option<String>,
    #[serde(default)]
    pub question_count: Option<u32>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A single answer inside a response payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerPayload {
    pub question_id: String,
    /// Free text, scanned for PII
    #[serde(default)]
    pub answer_text: Option<String>,
    /// Numeric answer value (Likert scale, score, ...)
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub time_spent_seconds: Option<u64>,
}

/// Raw assessment response record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub id: String,
    #[serde(default)]
    pub assessment_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub answers: Vec<AnswerPayload>,
    #[serde(default)]
    pub time_spent_seconds: Option<u64>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub browser: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Raw behavioral event record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    pub event_type: String,
    /// Free-form properties; string values are scanned for PII
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub browser: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_tag() {
        let record = EntityRecord::User(UserRecord {
            id: "u1".to_string(),
            organization_id: None,
            email: None,
            full_name: None,
            role: None,
            industry: None,
            organization_size: None,
            country: None,
            plan: None,
            bio: None,
            created_at: None,
        });
        assert_eq!(record.kind(), EntityKind::User);
        assert_eq!(record.id(), "u1");
    }

    #[test]
    fn test_tagged_deserialization() {
        let json = r#"{
            "kind": "event",
            "id": "ev-1",
            "user_id": "u1",
            "event_type": "page_view"
        }"#;
        let record: EntityRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind(), EntityKind::Event);
        match record {
            EntityRecord::Event(ev) => {
                assert_eq!(ev.event_type, "page_view");
                assert_eq!(ev.user_id.as_deref(), Some("u1"));
            }
            _ => panic!("expected event variant"),
        }
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(EntityKind::Organization.to_string(), "organization");
        assert_eq!(EntityKind::Response.as_str(), "response");
    }
}
