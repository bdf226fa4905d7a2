//! Database schema migrations.
//!
//! Idempotent: every statement is `CREATE ... IF NOT EXISTS`, so `grcack init`
//! can run any number of times. Timestamps are stored as Unix milliseconds.
//!
//! The `UNIQUE(user_id, document_id, document_version)` constraint on
//! `acknowledgments` is what keeps concurrent acknowledge calls from
//! producing two records for the same version.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL,
        external_id TEXT,
        display_name TEXT,
        role TEXT NOT NULL DEFAULT 'STAFF'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        version TEXT NOT NULL,
        status TEXT NOT NULL,
        requires_acknowledgement INTEGER NOT NULL DEFAULT 0,
        owner_id TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        last_changed_at INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS acknowledgments (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        document_id TEXT NOT NULL,
        document_version TEXT NOT NULL,
        acknowledged_at INTEGER NOT NULL,
        UNIQUE(user_id, document_id, document_version),
        FOREIGN KEY (user_id) REFERENCES users(id),
        FOREIGN KEY (document_id) REFERENCES documents(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS roster_entries (
        position INTEGER PRIMARY KEY,
        external_id TEXT NOT NULL,
        email TEXT NOT NULL,
        display_name TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS roster_sync (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        last_synced_at INTEGER NOT NULL,
        entry_count INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_users_email ON users(lower(email))",
    "CREATE INDEX IF NOT EXISTS idx_users_external_id ON users(external_id)",
    "CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status, requires_acknowledgement)",
    "CREATE INDEX IF NOT EXISTS idx_acknowledgments_user ON acknowledgments(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_acknowledgments_document ON acknowledgments(document_id, document_version)",
];

/// Apply the schema to an open pool.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Open the configured database, apply the schema, and close the pool.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    tracing::info!(path = %config.db.path.display(), "schema up to date");
    pool.close().await;
    Ok(())
}
