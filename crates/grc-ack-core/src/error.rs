//! Error taxonomy shared by every acknowledgment operation.
//!
//! Store implementations return [`anyhow::Result`]; those failures surface
//! here as [`AckError::Internal`] through `?`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AckError {
    /// Malformed identifier or request body. `fields` names the offending
    /// inputs (e.g. `documentId`, `documentIds[2]`).
    #[error("{message}")]
    InvalidInput { message: String, fields: Vec<String> },

    #[error("no authenticated caller")]
    Unauthenticated,

    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A business rule rejected the request (e.g. the document is a draft).
    #[error("{reason}")]
    InvalidState { reason: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AckResult<T> = Result<T, AckError>;

impl AckError {
    pub fn invalid_input(message: impl Into<String>, fields: Vec<String>) -> Self {
        AckError::InvalidInput {
            message: message.into(),
            fields,
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        AckError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        AckError::InvalidState {
            reason: reason.into(),
        }
    }
}
