//! # grc-ack core
//!
//! Storage-agnostic logic for tracking which staff members have acknowledged
//! which version of which policy document.
//!
//! The crate holds the data models, the error taxonomy, the [`store::AckStore`]
//! abstraction and the three operations built on top of it:
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`pending`] | Which documents a user still owes an acknowledgment for |
//! | [`recorder`] | Idempotent single and bulk acknowledgment creation |
//! | [`stats`] | Roster reconciliation, completion statistics, per-document detail |
//!
//! This crate contains no tokio, sqlx, or HTTP dependencies. Callers pass
//! an explicitly constructed store into every operation.

pub mod error;
pub mod models;
pub mod pending;
pub mod recorder;
pub mod stats;
pub mod store;

#[cfg(test)]
mod fixtures;

pub use error::{AckError, AckResult};
pub use models::Caller;
