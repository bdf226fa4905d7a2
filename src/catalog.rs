//! Document catalog import.
//!
//! Documents and user accounts are owned by the document-management
//! subsystem. `grcack catalog load` takes a JSON export from it and upserts
//! every entry, so the acknowledgment engine always reads the catalog's
//! latest view:
//!
//! ```json
//! {
//!   "users": [
//!     { "id": "u-1", "email": "alice@example.com", "externalId": "ext-1", "role": "STAFF" }
//!   ],
//!   "documents": [
//!     {
//!       "id": "550e8400-e29b-41d4-a716-446655440001",
//!       "title": "Acceptable Use Policy",
//!       "version": "2.0",
//!       "status": "APPROVED",
//!       "requiresAcknowledgement": true,
//!       "createdAt": "2024-01-01T00:00:00Z",
//!       "updatedAt": "2024-03-01T00:00:00Z",
//!       "lastChangedAt": "2024-03-01T00:00:00Z"
//!     }
//!   ]
//! }
//! ```
//!
//! Upserting a document with a new `version` reopens it for everyone who
//! acknowledged the previous one.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use grc_ack_core::models::{Document, User};
use grc_ack_core::store::AckStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// A catalog export file.
#[derive(Debug, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub documents: Vec<Document>,
}

impl Catalog {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog file: {}", path.display()))
    }
}

/// Upsert users first, then documents.
pub async fn apply_catalog<S: AckStore + ?Sized>(store: &S, catalog: &Catalog) -> Result<()> {
    for user in &catalog.users {
        store
            .upsert_user(user)
            .await
            .with_context(|| format!("Failed to store user {}", user.id))?;
    }
    for doc in &catalog.documents {
        store
            .upsert_document(doc)
            .await
            .with_context(|| format!("Failed to store document {}", doc.id))?;
    }
    Ok(())
}

/// Run `grcack catalog load <file>`.
pub async fn run_catalog_load(config: &Config, path: &Path) -> Result<()> {
    let catalog = Catalog::from_file(path)?;

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    apply_catalog(&store, &catalog).await?;
    pool.close().await;

    tracing::info!(
        users = catalog.users.len(),
        documents = catalog.documents.len(),
        "catalog loaded"
    );
    println!(
        "Loaded {} users and {} documents from {}",
        catalog.users.len(),
        catalog.documents.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use grc_ack_core::models::{DocumentStatus, Role};

    #[test]
    fn test_parse_catalog_defaults() {
        let catalog: Catalog = serde_json::from_str(
            r#"{
                "users": [{ "id": "u-1", "email": "a@example.com", "role": "EDITOR" }],
                "documents": [{
                    "id": "d-1", "title": "Policy", "version": "1.0", "status": "IN_REVIEW",
                    "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-02T00:00:00Z"
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(catalog.users[0].role, Role::Editor);
        assert!(catalog.users[0].external_id.is_none());
        let doc = &catalog.documents[0];
        assert_eq!(doc.status, DocumentStatus::InReview);
        assert!(!doc.requires_acknowledgement);
        assert!(doc.last_changed_at.is_none());
    }

    #[test]
    fn test_empty_catalog_is_valid() {
        let catalog: Catalog = serde_json::from_str("{}").unwrap();
        assert!(catalog.users.is_empty());
        assert!(catalog.documents.is_empty());
    }
}
