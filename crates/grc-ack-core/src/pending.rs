//! Pending-acknowledgment resolution.
//!
//! A document is pending for a user when it is approved, requires
//! acknowledgment, and the user's most recent acknowledgment of it is
//! missing or names a different version than the current one.
//!
//! # Algorithm
//!
//! 1. Resolve the caller to a local user by email.
//! 2. Fetch approved documents that require acknowledgment.
//! 3. Fetch the user's acknowledgment history.
//! 4. Reduce the history to the latest record per document
//!    ([`latest_acknowledgments`]).
//! 5. Keep documents where [`is_pending`] holds and attach owner summaries.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{AckError, AckResult};
use crate::models::{AcknowledgmentRecord, Caller, Document, OwnerSummary, User};
use crate::store::{AckStore, DocumentFilter};

/// A document the caller still has to acknowledge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDocument {
    #[serde(flatten)]
    pub document: Document,
    pub owner: Option<OwnerSummary>,
}

/// Reduce an acknowledgment history to the latest record per document.
///
/// "Latest" is decided by `acknowledged_at`. Equal timestamps fall back to
/// the greater version string, then the greater record id, so the result does
/// not depend on the order the storage layer returned the records in.
pub fn latest_acknowledgments(
    records: &[AcknowledgmentRecord],
) -> HashMap<&str, &AcknowledgmentRecord> {
    let mut latest: HashMap<&str, &AcknowledgmentRecord> = HashMap::new();
    for record in records {
        latest
            .entry(record.document_id.as_str())
            .and_modify(|current| {
                if supersedes(record, *current) {
                    *current = record;
                }
            })
            .or_insert(record);
    }
    latest
}

fn supersedes(candidate: &AcknowledgmentRecord, current: &AcknowledgmentRecord) -> bool {
    (
        candidate.acknowledged_at,
        &candidate.document_version,
        &candidate.id,
    ) > (current.acknowledged_at, &current.document_version, &current.id)
}

/// Whether `doc` still needs acknowledging given the user's latest records.
///
/// Versions are compared for exact equality only: moving to any other
/// version string, higher or lower, reopens the document.
pub fn is_pending(doc: &Document, latest: &HashMap<&str, &AcknowledgmentRecord>) -> bool {
    match latest.get(doc.id.as_str()) {
        Some(record) => record.document_version != doc.version,
        None => true,
    }
}

/// Resolve a caller to their local user account.
pub(crate) async fn resolve_user<S: AckStore + ?Sized>(
    store: &S,
    caller: &Caller,
) -> AckResult<User> {
    store
        .find_user_by_email(caller.email())
        .await?
        .ok_or_else(|| AckError::not_found("user", caller.email()))
}

/// Approved, acknowledgment-requiring documents the user has not
/// acknowledged at their current version.
pub(crate) async fn pending_for_user<S: AckStore + ?Sized>(
    store: &S,
    user: &User,
) -> AckResult<Vec<Document>> {
    let documents = store
        .list_documents(&DocumentFilter::acknowledgeable())
        .await?;
    let history = store.acknowledgments_for_user(&user.id).await?;
    let latest = latest_acknowledgments(&history);

    Ok(documents
        .into_iter()
        .filter(|doc| doc.is_acknowledgeable() && is_pending(doc, &latest))
        .collect())
}

/// Documents the caller must acknowledge right now, each annotated with its
/// owner. Read-only.
pub async fn pending_documents<S: AckStore + ?Sized>(
    store: &S,
    caller: &Caller,
) -> AckResult<Vec<PendingDocument>> {
    let user = resolve_user(store, caller).await?;
    let documents = pending_for_user(store, &user).await?;

    let mut owners: HashMap<String, Option<OwnerSummary>> = HashMap::new();
    let mut pending = Vec::with_capacity(documents.len());
    for document in documents {
        let owner = match &document.owner_id {
            Some(owner_id) => {
                if !owners.contains_key(owner_id) {
                    let summary = store.get_user(owner_id).await?.as_ref().map(OwnerSummary::from);
                    owners.insert(owner_id.clone(), summary);
                }
                owners.get(owner_id).cloned().flatten()
            }
            None => None,
        };
        pending.push(PendingDocument { document, owner });
    }

    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{ack_at, approved_doc, at, seeded_store, user};
    use crate::models::DocumentStatus;

    #[test]
    fn test_latest_wins_by_timestamp() {
        let records = vec![
            ack_at("r2", "u1", "doc-1", "2.0", at(2023, 2, 1)),
            ack_at("r1", "u1", "doc-1", "1.0", at(2023, 1, 1)),
        ];
        let latest = latest_acknowledgments(&records);
        assert_eq!(latest["doc-1"].document_version, "2.0");

        let reversed: Vec<_> = records.into_iter().rev().collect();
        let latest = latest_acknowledgments(&reversed);
        assert_eq!(latest["doc-1"].document_version, "2.0");
    }

    #[test]
    fn test_latest_uses_time_not_version_order() {
        // Acknowledged 2.0 first, then (oddly) 1.0 later: the later record wins.
        let records = vec![
            ack_at("r1", "u1", "doc-1", "2.0", at(2023, 1, 1)),
            ack_at("r2", "u1", "doc-1", "1.0", at(2023, 2, 1)),
        ];
        let latest = latest_acknowledgments(&records);
        assert_eq!(latest["doc-1"].document_version, "1.0");
    }

    #[test]
    fn test_latest_tie_is_deterministic() {
        let t = at(2023, 1, 1);
        let a = vec![
            ack_at("r1", "u1", "doc-1", "1.0", t),
            ack_at("r2", "u1", "doc-1", "1.1", t),
        ];
        let b: Vec<_> = a.iter().cloned().rev().collect();
        assert_eq!(
            latest_acknowledgments(&a)["doc-1"].id,
            latest_acknowledgments(&b)["doc-1"].id
        );
    }

    #[test]
    fn test_version_change_reopens_in_either_direction() {
        let records = vec![ack_at("r1", "u1", "doc-1", "2.0", at(2023, 2, 1))];
        let latest = latest_acknowledgments(&records);

        let mut doc = approved_doc("doc-1", "Policy", "2.0");
        assert!(!is_pending(&doc, &latest));

        doc.version = "3.0".into();
        assert!(is_pending(&doc, &latest));

        doc.version = "1.0".into();
        assert!(is_pending(&doc, &latest));
    }

    #[test]
    fn test_no_record_is_pending() {
        let latest = HashMap::new();
        assert!(is_pending(&approved_doc("doc-1", "Policy", "1.0"), &latest));
    }

    #[tokio::test]
    async fn test_pending_lists_unacknowledged_document() {
        let store = seeded_store().await;
        store
            .upsert_document(&approved_doc("doc-1", "Policy", "2.0"))
            .await
            .unwrap();

        let caller = Caller::new("alice@example.com").unwrap();
        let pending = pending_documents(&store, &caller).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].document.id, "doc-1");
    }

    #[tokio::test]
    async fn test_pending_empty_after_matching_acknowledgment() {
        let store = seeded_store().await;
        store
            .upsert_document(&approved_doc("doc-1", "Policy", "2.0"))
            .await
            .unwrap();
        store
            .insert_acknowledgment(&ack_at("r1", "u-alice", "doc-1", "2.0", at(2023, 2, 1)))
            .await
            .unwrap();

        let caller = Caller::new("alice@example.com").unwrap();
        assert!(pending_documents(&store, &caller).await.unwrap().is_empty());

        // A new version puts it back on the list.
        store
            .upsert_document(&approved_doc("doc-1", "Policy", "3.0"))
            .await
            .unwrap();
        assert_eq!(pending_documents(&store, &caller).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pending_skips_drafts_and_unflagged() {
        let store = seeded_store().await;
        let mut draft = approved_doc("doc-draft", "Draft", "1.0");
        draft.status = DocumentStatus::Draft;
        let mut unflagged = approved_doc("doc-info", "Info", "1.0");
        unflagged.requires_acknowledgement = false;
        store.upsert_document(&draft).await.unwrap();
        store.upsert_document(&unflagged).await.unwrap();

        let caller = Caller::new("alice@example.com").unwrap();
        assert!(pending_documents(&store, &caller).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pending_attaches_owner() {
        let store = seeded_store().await;
        let mut doc = approved_doc("doc-1", "Policy", "1.0");
        doc.owner_id = Some("u-owner".into());
        store
            .upsert_user(&user("u-owner", "owner@example.com", None))
            .await
            .unwrap();
        store.upsert_document(&doc).await.unwrap();

        let caller = Caller::new("ALICE@example.com").unwrap();
        let pending = pending_documents(&store, &caller).await.unwrap();
        let owner = pending[0].owner.as_ref().unwrap();
        assert_eq!(owner.email, "owner@example.com");
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let store = seeded_store().await;
        let caller = Caller::new("nobody@example.com").unwrap();
        let err = pending_documents(&store, &caller).await.unwrap_err();
        assert!(matches!(err, AckError::NotFound { entity: "user", .. }));
    }
}
