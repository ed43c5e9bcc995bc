//! Domain errors for the DCM coordination plane.

use std::collections::HashMap;
use thiserror::Error;

/// Domain-level errors that can occur anywhere in the core.
///
/// Services recover nothing except transient database errors (retried inside
/// the store); everything else bubbles to the HTTP or real-time layer, which
/// maps kinds to status codes / close codes.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation failed")]
    Validation {
        /// Per-field violation messages.
        details: HashMap<String, Vec<String>>,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Operation exceeded deadline")]
    Timeout,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Single-field validation failure.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut details = HashMap::new();
        details.insert(field.into(), vec![message.into()]);
        Self::Validation { details }
    }

    /// Validation failure with multiple violations.
    pub fn validation_details(details: HashMap<String, Vec<String>>) -> Self {
        Self::Validation { details }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether this error represents a transient database condition worth
    /// retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Timeout)
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DomainError::not_found("row", "unknown"),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DomainError::Conflict(db.to_string())
            }
            sqlx::Error::PoolTimedOut => DomainError::Timeout,
            _ => DomainError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_collects_field_messages() {
        let err = DomainError::validation("priority", "must be between 0 and 10");
        match err {
            DomainError::Validation { details } => {
                assert_eq!(details["priority"], vec!["must be between 0 and 10"]);
            }
            _ => panic!("expected validation error"),
        }
    }

    #[test]
    fn not_found_formats_entity_and_id() {
        let err = DomainError::not_found("subtask", "abc");
        assert_eq!(err.to_string(), "subtask not found: abc");
    }
}
