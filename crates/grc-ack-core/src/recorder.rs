//! Idempotent acknowledgment recording.
//!
//! One record exists per `(user, document, version)`. Acknowledging a
//! version that is already on file returns the stored record instead of
//! failing; callers distinguish the two cases through [`AckOutcome`].
//!
//! The uniqueness check is the store's insert, not a prior lookup: when two
//! requests race, the loser sees [`InsertOutcome::Duplicate`] and is served
//! the winner's record.

use std::collections::HashSet;

use anyhow::anyhow;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AckError, AckResult};
use crate::models::{AcknowledgmentRecord, Caller, Document, DocumentStatus, User};
use crate::pending::{pending_for_user, resolve_user};
use crate::store::{AckStore, InsertOutcome};

/// Whether an acknowledgment was newly created or already on file.
#[derive(Debug, Clone, PartialEq)]
pub enum AckOutcome {
    Created(AcknowledgmentRecord),
    Existing(AcknowledgmentRecord),
}

impl AckOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, AckOutcome::Created(_))
    }

    pub fn record(&self) -> &AcknowledgmentRecord {
        match self {
            AckOutcome::Created(r) | AckOutcome::Existing(r) => r,
        }
    }

    pub fn into_record(self) -> AcknowledgmentRecord {
        match self {
            AckOutcome::Created(r) | AckOutcome::Existing(r) => r,
        }
    }
}

/// Result of a bulk acknowledgment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    /// Number of distinct records in `acknowledgments`.
    pub acknowledged: usize,
    /// How many of them this call created.
    #[serde(skip)]
    pub created: usize,
    pub acknowledgments: Vec<AcknowledgmentRecord>,
}

fn parse_document_id(raw: &str, field: String) -> AckResult<()> {
    Uuid::parse_str(raw.trim())
        .map(|_| ())
        .map_err(|_| AckError::invalid_input("documentId must be a valid UUID", vec![field]))
}

/// Create-or-return for one document the user is allowed to acknowledge.
async fn record_for<S: AckStore + ?Sized>(
    store: &S,
    user: &User,
    doc: &Document,
) -> AckResult<AckOutcome> {
    if let Some(existing) = store
        .find_acknowledgment(&user.id, &doc.id, &doc.version)
        .await?
    {
        return Ok(AckOutcome::Existing(existing));
    }

    let record = AcknowledgmentRecord::new(user, doc, Utc::now());
    match store.insert_acknowledgment(&record).await? {
        InsertOutcome::Inserted => Ok(AckOutcome::Created(record)),
        InsertOutcome::Duplicate => store
            .find_acknowledgment(&user.id, &doc.id, &doc.version)
            .await?
            .map(AckOutcome::Existing)
            .ok_or_else(|| {
                AckError::Internal(anyhow!(
                    "acknowledgment for user {} on document {} v{} rejected as duplicate but not found",
                    user.id,
                    doc.id,
                    doc.version
                ))
            }),
    }
}

/// Acknowledge the current version of one document.
///
/// Fails with `InvalidInput` for a non-UUID id, `NotFound` for an unknown
/// caller or document, and `InvalidState` when the document is not approved
/// or does not require acknowledgment.
pub async fn acknowledge<S: AckStore + ?Sized>(
    store: &S,
    caller: &Caller,
    document_id: &str,
) -> AckResult<AckOutcome> {
    parse_document_id(document_id, "documentId".to_string())?;
    let document_id = document_id.trim();

    let user = resolve_user(store, caller).await?;
    let doc = store
        .get_document(document_id)
        .await?
        .ok_or_else(|| AckError::not_found("document", document_id))?;

    if doc.status != DocumentStatus::Approved {
        return Err(AckError::invalid_state("Document is not approved"));
    }
    if !doc.requires_acknowledgement {
        return Err(AckError::invalid_state(
            "Document does not require acknowledgement",
        ));
    }

    record_for(store, &user, &doc).await
}

/// Acknowledge several documents at once.
///
/// With no ids (or an empty list) the target set is everything currently
/// pending for the caller. With ids, unknown documents and documents that
/// are not approved or do not require acknowledgment are dropped without
/// error. Documents are processed one by one; a failure stops the batch but
/// leaves earlier acknowledgments in place.
pub async fn acknowledge_bulk<S: AckStore + ?Sized>(
    store: &S,
    caller: &Caller,
    document_ids: Option<&[String]>,
) -> AckResult<BulkOutcome> {
    let requested = document_ids.filter(|ids| !ids.is_empty());

    if let Some(ids) = requested {
        let invalid: Vec<String> = ids
            .iter()
            .enumerate()
            .filter(|(_, id)| Uuid::parse_str(id.trim()).is_err())
            .map(|(i, _)| format!("documentIds[{}]", i))
            .collect();
        if !invalid.is_empty() {
            return Err(AckError::invalid_input(
                "documentIds must contain valid UUIDs",
                invalid,
            ));
        }
    }

    let user = resolve_user(store, caller).await?;

    let targets = match requested {
        Some(ids) => {
            let mut seen = HashSet::new();
            let mut docs = Vec::new();
            for id in ids.iter().map(|id| id.trim()) {
                if !seen.insert(id) {
                    continue;
                }
                if let Some(doc) = store.get_document(id).await? {
                    if doc.is_acknowledgeable() {
                        docs.push(doc);
                    }
                }
            }
            docs
        }
        None => pending_for_user(store, &user).await?,
    };

    let mut acknowledgments = Vec::with_capacity(targets.len());
    let mut created = 0;
    for doc in &targets {
        let outcome = record_for(store, &user, doc).await.map_err(|e| match e {
            AckError::Internal(err) => AckError::Internal(err.context(format!(
                "bulk acknowledgment stopped at document {}",
                doc.id
            ))),
            other => AckError::Internal(anyhow!(other.to_string())),
        })?;
        if outcome.is_created() {
            created += 1;
        }
        acknowledgments.push(outcome.into_record());
    }

    Ok(BulkOutcome {
        acknowledged: acknowledgments.len(),
        created,
        acknowledgments,
    })
}
