//! Staff roster snapshot import.
//!
//! The directory sync job produces the list of people who must acknowledge
//! governed documents. `grcack roster load` replaces the stored snapshot with
//! its output:
//!
//! ```json
//! {
//!   "syncedAt": "2024-05-01T06:00:00Z",
//!   "entries": [
//!     { "externalId": "ext-1", "email": "alice@example.com", "displayName": "Alice" }
//!   ]
//! }
//! ```
//!
//! `syncedAt` is optional and defaults to the time of the load. It is
//! reported as `dataAsOf` by the statistics endpoints.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use grc_ack_core::models::StaffRosterEntry;
use grc_ack_core::store::AckStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterFile {
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
    pub entries: Vec<StaffRosterEntry>,
}

impl RosterFile {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read roster file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse roster file: {}", path.display()))
    }
}

/// Replace the stored roster, returning the sync timestamp recorded.
pub async fn apply_roster<S: AckStore + ?Sized>(
    store: &S,
    roster: &RosterFile,
) -> Result<DateTime<Utc>> {
    let synced_at = roster.synced_at.unwrap_or_else(Utc::now);
    store
        .replace_roster(&roster.entries, synced_at)
        .await
        .context("Failed to replace roster snapshot")?;
    Ok(synced_at)
}

/// Run `grcack roster load <file>`.
pub async fn run_roster_load(config: &Config, path: &Path) -> Result<()> {
    let roster = RosterFile::from_file(path)?;

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let synced_at = apply_roster(&store, &roster).await?;
    pool.close().await;

    tracing::info!(entries = roster.entries.len(), %synced_at, "roster replaced");
    println!(
        "Loaded {} roster entries (synced at {})",
        roster.entries.len(),
        synced_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}
