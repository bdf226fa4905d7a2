//! SQLite-backed [`AckStore`] implementation.
//!
//! Maps each [`AckStore`] operation onto the schema created by
//! [`crate::migrate`]. Timestamps are stored as Unix milliseconds and
//! converted back to `DateTime<Utc>` on read.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use grc_ack_core::models::{
    AcknowledgmentRecord, Document, DocumentStatus, Role, RosterSnapshot, StaffRosterEntry, User,
};
use grc_ack_core::store::{AckStore, DocumentFilter, InsertOutcome};

/// SQLite implementation of the [`AckStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("timestamp out of range: {}", ms))
}

const USER_COLUMNS: &str = "id, email, external_id, display_name, role";

const DOCUMENT_COLUMNS: &str = "id, title, version, status, requires_acknowledgement, owner_id, \
     created_at, updated_at, last_changed_at";

const ACK_COLUMNS: &str = "id, user_id, document_id, document_version, acknowledged_at";

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        external_id: row.try_get("external_id")?,
        display_name: row.try_get("display_name")?,
        role: role.parse::<Role>()?,
    })
}

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    let status: String = row.try_get("status")?;
    let last_changed: Option<i64> = row.try_get("last_changed_at")?;
    Ok(Document {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        version: row.try_get("version")?,
        status: status.parse::<DocumentStatus>()?,
        requires_acknowledgement: row.try_get::<i64, _>("requires_acknowledgement")? != 0,
        owner_id: row.try_get("owner_id")?,
        created_at: from_millis(row.try_get("created_at")?)?,
        updated_at: from_millis(row.try_get("updated_at")?)?,
        last_changed_at: last_changed.map(from_millis).transpose()?,
    })
}

fn ack_from_row(row: &SqliteRow) -> Result<AcknowledgmentRecord> {
    Ok(AcknowledgmentRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        document_id: row.try_get("document_id")?,
        document_version: row.try_get("document_version")?,
        acknowledged_at: from_millis(row.try_get("acknowledged_at")?)?,
    })
}

#[async_trait]
impl AckStore for SqliteStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE lower(email) = lower(?) ORDER BY id LIMIT 1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(user_from_row).collect()
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(document_from_row).transpose()
    }

    async fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM documents
            WHERE (? IS NULL OR status = ?)
              AND (? IS NULL OR requires_acknowledgement = ?)
            ORDER BY title, id
            "#,
            DOCUMENT_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.requires_acknowledgement.map(i64::from))
        .bind(filter.requires_acknowledgement.map(i64::from))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(document_from_row).collect()
    }

    async fn acknowledgments_for_user(&self, user_id: &str) -> Result<Vec<AcknowledgmentRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM acknowledgments WHERE user_id = ?",
            ACK_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(ack_from_row).collect()
    }

    async fn acknowledgments_for_version(
        &self,
        document_id: &str,
        version: &str,
    ) -> Result<Vec<AcknowledgmentRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM acknowledgments WHERE document_id = ? AND document_version = ?",
            ACK_COLUMNS
        ))
        .bind(document_id)
        .bind(version)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(ack_from_row).collect()
    }

    async fn find_acknowledgment(
        &self,
        user_id: &str,
        document_id: &str,
        version: &str,
    ) -> Result<Option<AcknowledgmentRecord>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM acknowledgments
            WHERE user_id = ? AND document_id = ? AND document_version = ?
            "#,
            ACK_COLUMNS
        ))
        .bind(user_id)
        .bind(document_id)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(ack_from_row).transpose()
    }

    async fn insert_acknowledgment(&self, record: &AcknowledgmentRecord) -> Result<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO acknowledgments (id, user_id, document_id, document_version, acknowledged_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id, document_id, document_version) DO NOTHING
            "#,
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.document_id)
        .bind(&record.document_version)
        .bind(to_millis(record.acknowledged_at))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn roster_snapshot(&self) -> Result<RosterSnapshot> {
        let rows = sqlx::query(
            "SELECT external_id, email, display_name FROM roster_entries ORDER BY position",
        )
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .iter()
            .map(|row| -> Result<StaffRosterEntry> {
                Ok(StaffRosterEntry {
                    external_id: row.try_get("external_id")?,
                    email: row.try_get("email")?,
                    display_name: row.try_get("display_name")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let synced: Option<i64> =
            sqlx::query_scalar("SELECT last_synced_at FROM roster_sync WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(RosterSnapshot {
            entries,
            last_synced_at: synced.map(from_millis).transpose()?,
        })
    }

    async fn upsert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, external_id, display_name, role)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                external_id = excluded.external_id,
                display_name = excluded.display_name,
                role = excluded.role
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.external_id)
        .bind(&user.display_name)
        .bind(user.role.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, title, version, status, requires_acknowledgement,
                                   owner_id, created_at, updated_at, last_changed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                version = excluded.version,
                status = excluded.status,
                requires_acknowledgement = excluded.requires_acknowledgement,
                owner_id = excluded.owner_id,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                last_changed_at = excluded.last_changed_at
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.title)
        .bind(&doc.version)
        .bind(doc.status.as_str())
        .bind(i64::from(doc.requires_acknowledgement))
        .bind(&doc.owner_id)
        .bind(to_millis(doc.created_at))
        .bind(to_millis(doc.updated_at))
        .bind(doc.last_changed_at.map(to_millis))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn replace_roster(
        &self,
        entries: &[StaffRosterEntry],
        synced_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM roster_entries")
            .execute(&mut *tx)
            .await?;

        // Duplicate entries are kept; the directory is the source of truth.
        for (position, entry) in entries.iter().enumerate() {
            sqlx::query(
                "INSERT INTO roster_entries (position, external_id, email, display_name) VALUES (?, ?, ?, ?)",
            )
            .bind(position as i64)
            .bind(&entry.external_id)
            .bind(&entry.email)
            .bind(&entry.display_name)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO roster_sync (id, last_synced_at, entry_count)
            VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                last_synced_at = excluded.last_synced_at,
                entry_count = excluded.entry_count
            "#,
        )
        .bind(to_millis(synced_at))
        .bind(entries.len() as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
