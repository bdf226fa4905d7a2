//! Core data models.
//!
//! Documents, users and roster entries are owned by other subsystems and
//! only read here. [`AcknowledgmentRecord`] is the one entity this crate
//! writes, and it is never updated once created.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AckError;

/// Lifecycle state of a governed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Draft,
    InReview,
    Approved,
    Superseded,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "DRAFT",
            DocumentStatus::InReview => "IN_REVIEW",
            DocumentStatus::Approved => "APPROVED",
            DocumentStatus::Superseded => "SUPERSEDED",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "DRAFT" => Ok(DocumentStatus::Draft),
            "IN_REVIEW" => Ok(DocumentStatus::InReview),
            "APPROVED" => Ok(DocumentStatus::Approved),
            "SUPERSEDED" => Ok(DocumentStatus::Superseded),
            other => bail!("unknown document status: {}", other),
        }
    }
}

/// Local account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Editor,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Editor => "EDITOR",
            Role::Staff => "STAFF",
        }
    }

    /// ADMIN and EDITOR may read organization-wide completion data.
    pub fn can_view_stats(&self) -> bool {
        matches!(self, Role::Admin | Role::Editor)
    }

    /// Accounts that can be credited against the staff roster.
    pub fn is_staff_equivalent(&self) -> bool {
        matches!(self, Role::Staff)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "EDITOR" => Ok(Role::Editor),
            "STAFF" => Ok(Role::Staff),
            other => bail!("unknown role: {}", other),
        }
    }
}

/// A governed document as published by the document catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    /// Opaque version label. Only ever compared for equality.
    pub version: String,
    pub status: DocumentStatus,
    #[serde(default)]
    pub requires_acknowledgement: bool,
    #[serde(default)]
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Last metadata update.
    pub updated_at: DateTime<Utc>,
    /// Last content change, i.e. when the current version was published.
    #[serde(default)]
    pub last_changed_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Approved and flagged as requiring acknowledgment.
    pub fn is_acknowledgeable(&self) -> bool {
        self.status == DocumentStatus::Approved && self.requires_acknowledgement
    }

    /// The moment staff became obliged to acknowledge the current version.
    pub fn required_since(&self) -> DateTime<Utc> {
        self.last_changed_at.unwrap_or(self.created_at)
    }
}

/// A local user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    /// Identifier of this person in the external staff directory.
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    pub role: Role,
}

/// Owner annotation attached to documents in API responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    pub id: String,
    pub display_name: Option<String>,
    pub email: String,
}

impl From<&User> for OwnerSummary {
    fn from(user: &User) -> Self {
        OwnerSummary {
            id: user.id.clone(),
            display_name: user.display_name.clone(),
            email: user.email.clone(),
        }
    }
}

/// One user's confirmation of one document version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgmentRecord {
    pub id: String,
    pub user_id: String,
    pub document_id: String,
    pub document_version: String,
    pub acknowledged_at: DateTime<Utc>,
}

impl AcknowledgmentRecord {
    /// A fresh record for `user` acknowledging the current version of `doc`.
    pub fn new(user: &User, doc: &Document, acknowledged_at: DateTime<Utc>) -> Self {
        AcknowledgmentRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            document_id: doc.id.clone(),
            document_version: doc.version.clone(),
            acknowledged_at,
        }
    }
}

/// A person the directory says is subject to acknowledgment requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffRosterEntry {
    pub external_id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// The latest roster sync result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosterSnapshot {
    pub entries: Vec<StaffRosterEntry>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// The authenticated caller, as asserted by the upstream identity layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    email: String,
}

impl Caller {
    /// Fails with [`AckError::Unauthenticated`] for a blank identity.
    pub fn new(email: &str) -> Result<Self, AckError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AckError::Unauthenticated);
        }
        Ok(Caller {
            email: email.to_string(),
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn doc(status: DocumentStatus, requires: bool) -> Document {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Document {
            id: "d1".into(),
            title: "Acceptable Use".into(),
            version: "1.0".into(),
            status,
            requires_acknowledgement: requires,
            owner_id: None,
            created_at: created,
            updated_at: created,
            last_changed_at: None,
        }
    }

    #[test]
    fn test_status_roundtrips_through_str() {
        for s in [
            DocumentStatus::Draft,
            DocumentStatus::InReview,
            DocumentStatus::Approved,
            DocumentStatus::Superseded,
        ] {
            assert_eq!(s.as_str().parse::<DocumentStatus>().unwrap(), s);
        }
        assert!("approved".parse::<DocumentStatus>().is_err());
    }

    #[test]
    fn test_only_approved_with_flag_is_acknowledgeable() {
        assert!(doc(DocumentStatus::Approved, true).is_acknowledgeable());
        assert!(!doc(DocumentStatus::Approved, false).is_acknowledgeable());
        assert!(!doc(DocumentStatus::Draft, true).is_acknowledgeable());
    }

    #[test]
    fn test_required_since_prefers_content_change() {
        let mut d = doc(DocumentStatus::Approved, true);
        assert_eq!(d.required_since(), d.created_at);

        let changed = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        d.last_changed_at = Some(changed);
        d.updated_at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(d.required_since(), changed);
    }

    #[test]
    fn test_blank_caller_is_unauthenticated() {
        assert!(matches!(Caller::new("  "), Err(AckError::Unauthenticated)));
        assert_eq!(Caller::new(" a@example.com ").unwrap().email(), "a@example.com");
    }

    #[test]
    fn test_document_serializes_camel_case() {
        let json = serde_json::to_value(doc(DocumentStatus::Approved, true)).unwrap();
        assert_eq!(json["requiresAcknowledgement"], true);
        assert_eq!(json["status"], "APPROVED");
    }
}
