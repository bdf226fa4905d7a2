//! # grc-ack
//!
//! Document acknowledgment tracking for a governance, risk and compliance
//! (GRC) system: which approved documents each staff member still has to
//! acknowledge, idempotent recording of acknowledgments, and completion
//! statistics reconciled against the synced staff roster.
//!
//! The storage-agnostic logic lives in [`grc_ack_core`]; this crate adds the
//! SQLite store, configuration, the HTTP API and the `grcack` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  ┌──────────────┐
//! │   Catalog    │  │    Roster    │
//! │ (docs/users) │  │  (directory) │
//! └──────┬───────┘  └──────┬───────┘
//!        ▼                 ▼
//!     ┌──────────────────────┐      ┌──────────────────┐
//!     │        SQLite        │◀────▶│  grc-ack-core    │
//!     │  acknowledgments     │      │ resolve/record/  │
//!     └──────────────────────┘      │ aggregate        │
//!                                   └────────┬─────────┘
//!                          ┌─────────────────┤
//!                          ▼                 ▼
//!                     ┌─────────┐       ┌─────────┐
//!                     │   CLI   │       │  HTTP   │
//!                     │(grcack) │       │ (axum)  │
//!                     └─────────┘       └─────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite [`AckStore`](grc_ack_core::store::AckStore) |
//! | [`catalog`] | Document and user import |
//! | [`roster`] | Roster snapshot import |
//! | [`ack_cmd`] | `pending` / `ack` commands |
//! | [`stats`] | `stats` command |
//! | [`server`] | HTTP API |

pub mod ack_cmd;
pub mod catalog;
pub mod config;
pub mod db;
pub mod migrate;
pub mod roster;
pub mod server;
pub mod sqlite_store;
pub mod stats;
