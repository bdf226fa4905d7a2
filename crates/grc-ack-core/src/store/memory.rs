//! In-memory [`AckStore`] implementation for tests and embedders.
//!
//! Uses `BTreeMap`s behind `std::sync::RwLock`. The acknowledgment map is
//! keyed by `(user_id, document_id, document_version)`, so the uniqueness
//! check and the insert happen under one write lock.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{AcknowledgmentRecord, Document, RosterSnapshot, StaffRosterEntry, User};

use super::{AckStore, DocumentFilter, InsertOutcome};

type AckKey = (String, String, String);

/// In-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<BTreeMap<String, User>>,
    documents: RwLock<BTreeMap<String, Document>>,
    acknowledgments: RwLock<BTreeMap<AckKey, AcknowledgmentRecord>>,
    roster: RwLock<RosterSnapshot>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored acknowledgment records.
    pub fn acknowledgment_count(&self) -> usize {
        self.acknowledgments.read().map(|a| a.len()).unwrap_or(0)
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn key(user_id: &str, document_id: &str, version: &str) -> AckKey {
    (
        user_id.to_string(),
        document_id.to_string(),
        version.to_string(),
    )
}

#[async_trait]
impl AckStore for InMemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = read(&self.users)?;
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        Ok(read(&self.users)?.get(id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(read(&self.users)?.values().cloned().collect())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(read(&self.documents)?.get(id).cloned())
    }

    async fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>> {
        let mut docs: Vec<Document> = read(&self.documents)?
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        docs.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        Ok(docs)
    }

    async fn acknowledgments_for_user(&self, user_id: &str) -> Result<Vec<AcknowledgmentRecord>> {
        Ok(read(&self.acknowledgments)?
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn acknowledgments_for_version(
        &self,
        document_id: &str,
        version: &str,
    ) -> Result<Vec<AcknowledgmentRecord>> {
        Ok(read(&self.acknowledgments)?
            .values()
            .filter(|r| r.document_id == document_id && r.document_version == version)
            .cloned()
            .collect())
    }

    async fn find_acknowledgment(
        &self,
        user_id: &str,
        document_id: &str,
        version: &str,
    ) -> Result<Option<AcknowledgmentRecord>> {
        Ok(read(&self.acknowledgments)?
            .get(&key(user_id, document_id, version))
            .cloned())
    }

    async fn insert_acknowledgment(&self, record: &AcknowledgmentRecord) -> Result<InsertOutcome> {
        let mut acks = write(&self.acknowledgments)?;
        let k = key(&record.user_id, &record.document_id, &record.document_version);
        if acks.contains_key(&k) {
            return Ok(InsertOutcome::Duplicate);
        }
        acks.insert(k, record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn roster_snapshot(&self) -> Result<RosterSnapshot> {
        Ok(read(&self.roster)?.clone())
    }

    async fn upsert_user(&self, user: &User) -> Result<()> {
        write(&self.users)?.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn upsert_document(&self, doc: &Document) -> Result<()> {
        write(&self.documents)?.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn replace_roster(
        &self,
        entries: &[StaffRosterEntry],
        synced_at: DateTime<Utc>,
    ) -> Result<()> {
        *write(&self.roster)? = RosterSnapshot {
            entries: entries.to_vec(),
            last_synced_at: Some(synced_at),
        };
        Ok(())
    }
}
