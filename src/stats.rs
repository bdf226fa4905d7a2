//! Completion statistics from the command line.
//!
//! `grcack stats` runs the same aggregation as `GET /acknowledgments/stats`
//! with operator access and prints a per-document table, optionally followed
//! by who has and has not acknowledged each document.

use anyhow::Result;
use chrono::{DateTime, Utc};

use grc_ack_core::stats::{completion_stats, StatsAccess, StatsFilter, StatsReport};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Run the stats command: aggregate and print a summary.
pub async fn run_stats(config: &Config, filter: StatsFilter) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let report = completion_stats(&store, &StatsAccess::operator(), &filter).await;
    pool.close().await;
    let report = report?;

    print_report(&report, filter.include_users);
    Ok(())
}

fn print_report(report: &StatsReport, include_users: bool) {
    let as_of = match report.data_as_of {
        Some(ts) => format_ts_relative(ts),
        None => "never synced".to_string(),
    };

    println!("Acknowledgment Completion");
    println!("=========================");
    println!();
    println!("  Roster:      {} staff ({})", report.summary.total_users, as_of);
    println!("  Documents:   {}", report.summary.total_documents);
    println!(
        "  Overall:     {} acknowledgments ({}%)",
        report.summary.total_acknowledgments, report.summary.overall_percentage
    );

    if report.documents.is_empty() {
        println!();
        return;
    }

    println!();
    println!(
        "  {:<32} {:>8} {:>6} {:>8} {:>8}",
        "DOCUMENT", "VERSION", "ACKED", "PENDING", "PERCENT"
    );
    println!("  {}", "-".repeat(66));
    for doc in &report.documents {
        println!(
            "  {:<32} {:>8} {:>6} {:>8} {:>7}%",
            truncate(&doc.title, 32),
            doc.version,
            doc.acknowledged_count,
            doc.not_acknowledged_count,
            doc.percentage
        );

        if !include_users {
            continue;
        }
        for user in doc.acknowledged_users.iter().flatten() {
            println!(
                "      + {:<40} {} ({} day{} after required)",
                user.display_name.as_deref().unwrap_or(&user.email),
                user.acknowledged_at.format("%Y-%m-%d"),
                user.days_since_required,
                if user.days_since_required == 1 { "" } else { "s" }
            );
        }
        for user in doc.not_acknowledged_users.iter().flatten() {
            println!(
                "      - {}",
                user.display_name.as_deref().unwrap_or(&user.email)
            );
        }
    }
    println!();
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

/// Format a timestamp relative to now (e.g. "3 hours ago").
fn format_ts_relative(ts: DateTime<Utc>) -> String {
    let delta = (Utc::now() - ts).num_seconds();

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "synced just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("synced {} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("synced {} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("synced {} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: DateTime<Utc>) -> String {
    format!("synced {}", ts.format("%Y-%m-%d %H:%M"))
}
