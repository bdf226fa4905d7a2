//! # grc-ack CLI (`grcack`)
//!
//! The `grcack` binary initializes the database, loads the document catalog
//! and roster snapshots, serves the acknowledgment API, and offers
//! command-line access to the resolver, recorder and statistics.
//!
//! ## Usage
//!
//! ```bash
//! grcack --config ./config/grcack.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `grcack init` | Create the SQLite database and run schema migrations |
//! | `grcack serve` | Start the HTTP API |
//! | `grcack catalog load <file>` | Upsert users and documents from a catalog export |
//! | `grcack roster load <file>` | Replace the staff roster snapshot |
//! | `grcack pending <email>` | List documents a user still has to acknowledge |
//! | `grcack ack <email> <document-id>` | Acknowledge a document on a user's behalf |
//! | `grcack stats` | Print completion statistics |
//!
//! ## Examples
//!
//! ```bash
//! grcack init
//! grcack catalog load ./exports/catalog.json
//! grcack roster load ./exports/roster.json
//! grcack stats --users --limit 10
//! grcack serve
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use grc_ack::{ack_cmd, catalog, config, migrate, roster, server, stats};
use grc_ack_core::stats::StatsFilter;

/// grc-ack CLI: document acknowledgment tracking and completion statistics.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "grcack",
    about = "grc-ack: document acknowledgment tracking and completion statistics",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/grcack.toml`.
    #[arg(long, global = true, default_value = "./config/grcack.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all tables. Safe to run
    /// repeatedly.
    Init,

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Import the document catalog.
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Import the staff roster.
    Roster {
        #[command(subcommand)]
        action: RosterAction,
    },

    /// List documents a user still has to acknowledge.
    Pending {
        /// The user's email address.
        email: String,
    },

    /// Acknowledge the current version of a document on a user's behalf.
    ///
    /// Acknowledging a version that is already on file reports the existing
    /// record and changes nothing.
    Ack {
        /// The user's email address.
        email: String,
        /// Document UUID.
        document_id: String,
    },

    /// Print completion statistics for approved documents.
    Stats {
        /// Restrict to a single document.
        #[arg(long)]
        document: Option<String>,

        /// Maximum number of documents (1-200).
        #[arg(long)]
        limit: Option<u32>,

        /// List who has and has not acknowledged each document.
        #[arg(long)]
        users: bool,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Upsert users and documents from a JSON export.
    Load {
        /// Path to the catalog JSON file.
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum RosterAction {
    /// Replace the roster snapshot from a JSON file.
    Load {
        /// Path to the roster JSON file.
        file: PathBuf,
    },
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    init_tracing(&cfg.log.filter);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Catalog {
            action: CatalogAction::Load { file },
        } => {
            catalog::run_catalog_load(&cfg, &file).await?;
        }
        Commands::Roster {
            action: RosterAction::Load { file },
        } => {
            roster::run_roster_load(&cfg, &file).await?;
        }
        Commands::Pending { email } => {
            ack_cmd::run_pending(&cfg, &email).await?;
        }
        Commands::Ack { email, document_id } => {
            ack_cmd::run_ack(&cfg, &email, &document_id).await?;
        }
        Commands::Stats {
            document,
            limit,
            users,
        } => {
            let filter = StatsFilter {
                document_id: document,
                limit,
                include_users: users,
            };
            stats::run_stats(&cfg, filter).await?;
        }
    }

    Ok(())
}
