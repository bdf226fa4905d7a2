//! `grcack pending` and `grcack ack`.
//!
//! Command-line access to the resolver and the single-document recorder,
//! acting on behalf of the user named by email.

use anyhow::Result;

use grc_ack_core::pending::pending_documents;
use grc_ack_core::recorder::{acknowledge, AckOutcome};
use grc_ack_core::Caller;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Print the documents `email` still has to acknowledge.
pub async fn run_pending(config: &Config, email: &str) -> Result<()> {
    let caller = Caller::new(email)?;
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let pending = pending_documents(&store, &caller).await;
    pool.close().await;
    let pending = pending?;

    if pending.is_empty() {
        println!("No pending acknowledgments for {}.", caller.email());
        return Ok(());
    }

    println!(
        "{} pending acknowledgment{} for {}:",
        pending.len(),
        if pending.len() == 1 { "" } else { "s" },
        caller.email()
    );
    println!();
    println!("  {:<36}  {:<8}  {:<20}  TITLE", "DOCUMENT", "VERSION", "OWNER");
    println!("  {}", "-".repeat(90));
    for item in &pending {
        let owner = item
            .owner
            .as_ref()
            .map(|o| o.display_name.clone().unwrap_or_else(|| o.email.clone()))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<36}  {:<8}  {:<20}  {}",
            item.document.id, item.document.version, owner, item.document.title
        );
    }
    Ok(())
}

/// Acknowledge the current version of `document_id` as `email`.
pub async fn run_ack(config: &Config, email: &str, document_id: &str) -> Result<()> {
    let caller = Caller::new(email)?;
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let outcome = acknowledge(&store, &caller, document_id).await;
    pool.close().await;

    match outcome? {
        AckOutcome::Created(record) => {
            tracing::info!(
                user_id = %record.user_id,
                document_id = %record.document_id,
                version = %record.document_version,
                "acknowledgment recorded"
            );
            println!(
                "Acknowledged {} v{} (record {})",
                record.document_id, record.document_version, record.id
            );
        }
        AckOutcome::Existing(record) => {
            println!(
                "Already acknowledged {} v{} on {} (record {})",
                record.document_id,
                record.document_version,
                record.acknowledged_at.format("%Y-%m-%d %H:%M"),
                record.id
            );
        }
    }
    Ok(())
}
