//! Shared builders for unit tests.

use chrono::{DateTime, TimeZone, Utc};

use crate::models::{AcknowledgmentRecord, Document, DocumentStatus, Role, User};
use crate::store::memory::InMemoryStore;
use crate::store::AckStore;

pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
}

pub fn approved_doc(id: &str, title: &str, version: &str) -> Document {
    Document {
        id: id.to_string(),
        title: title.to_string(),
        version: version.to_string(),
        status: DocumentStatus::Approved,
        requires_acknowledgement: true,
        owner_id: None,
        created_at: at(2023, 1, 1),
        updated_at: at(2023, 1, 1),
        last_changed_at: None,
    }
}

pub fn user(id: &str, email: &str, external_id: Option<&str>) -> User {
    User {
        id: id.to_string(),
        email: email.to_string(),
        external_id: external_id.map(str::to_string),
        display_name: None,
        role: Role::Staff,
    }
}

pub fn ack_at(
    id: &str,
    user_id: &str,
    document_id: &str,
    version: &str,
    acknowledged_at: DateTime<Utc>,
) -> AcknowledgmentRecord {
    AcknowledgmentRecord {
        id: id.to_string(),
        user_id: user_id.to_string(),
        document_id: document_id.to_string(),
        document_version: version.to_string(),
        acknowledged_at,
    }
}

/// A store holding `alice@example.com` (staff) and `editor@example.com`.
pub async fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store
        .upsert_user(&user("u-alice", "alice@example.com", Some("ext-alice")))
        .await
        .unwrap();
    let mut editor = user("u-editor", "editor@example.com", None);
    editor.role = Role::Editor;
    store.upsert_user(&editor).await.unwrap();
    store
}
