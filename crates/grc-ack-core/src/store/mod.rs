//! Storage abstraction for acknowledgment tracking.
//!
//! The [`AckStore`] trait covers every read the resolver, recorder and
//! aggregator need, the single write the recorder performs, and the
//! collaborator-side writes (catalog and roster loading) that feed them.
//!
//! Implementations must be `Send + Sync` to work with async runtimes, and
//! must enforce uniqueness of `(user_id, document_id, document_version)` in
//! [`insert_acknowledgment`](AckStore::insert_acknowledgment) atomically.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    AcknowledgmentRecord, Document, DocumentStatus, RosterSnapshot, StaffRosterEntry, User,
};

/// Result of an acknowledgment insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A record for the same (user, document, version) already exists.
    Duplicate,
}

/// Optional predicates for [`AckStore::list_documents`].
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub status: Option<DocumentStatus>,
    pub requires_acknowledgement: Option<bool>,
}

impl DocumentFilter {
    /// Approved documents that require acknowledgment.
    pub fn acknowledgeable() -> Self {
        DocumentFilter {
            status: Some(DocumentStatus::Approved),
            requires_acknowledgement: Some(true),
        }
    }

    pub fn approved() -> Self {
        DocumentFilter {
            status: Some(DocumentStatus::Approved),
            requires_acknowledgement: None,
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.status.is_none_or(|s| s == doc.status)
            && self
                .requires_acknowledgement
                .is_none_or(|r| r == doc.requires_acknowledgement)
    }
}

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find_user_by_email`](AckStore::find_user_by_email) | Case-insensitive user lookup |
/// | [`list_documents`](AckStore::list_documents) | Catalog listing, ordered by title then id |
/// | [`acknowledgments_for_user`](AckStore::acknowledgments_for_user) | A user's full history |
/// | [`acknowledgments_for_version`](AckStore::acknowledgments_for_version) | All records for one document version |
/// | [`insert_acknowledgment`](AckStore::insert_acknowledgment) | Constraint-checked insert |
/// | [`roster_snapshot`](AckStore::roster_snapshot) | Latest directory sync |
#[async_trait]
pub trait AckStore: Send + Sync {
    /// First user (by id) whose email matches, ignoring ASCII case.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn get_user(&self, id: &str) -> Result<Option<User>>;

    /// All local users, ordered by id.
    async fn list_users(&self) -> Result<Vec<User>>;

    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    async fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>>;

    async fn acknowledgments_for_user(&self, user_id: &str) -> Result<Vec<AcknowledgmentRecord>>;

    async fn acknowledgments_for_version(
        &self,
        document_id: &str,
        version: &str,
    ) -> Result<Vec<AcknowledgmentRecord>>;

    async fn find_acknowledgment(
        &self,
        user_id: &str,
        document_id: &str,
        version: &str,
    ) -> Result<Option<AcknowledgmentRecord>>;

    /// Insert unless a record for the same triple exists. Must be atomic
    /// with respect to concurrent inserts.
    async fn insert_acknowledgment(&self, record: &AcknowledgmentRecord) -> Result<InsertOutcome>;

    async fn roster_snapshot(&self) -> Result<RosterSnapshot>;

    /// Insert or replace a user (catalog loading).
    async fn upsert_user(&self, user: &User) -> Result<()>;

    /// Insert or replace a document (catalog loading).
    async fn upsert_document(&self, doc: &Document) -> Result<()>;

    /// Swap in a new roster snapshot.
    async fn replace_roster(
        &self,
        entries: &[StaffRosterEntry],
        synced_at: DateTime<Utc>,
    ) -> Result<()>;
}
