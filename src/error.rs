//! Unified error type returned by every repository operation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("reviewer {reviewer_id} is already assigned to submission {submission_id}")]
    DuplicateAssignment {
        submission_id: String,
        reviewer_id: String,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Stable machine-readable code used in the API error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Database(_) => "DATABASE_ERROR",
            Error::NotFound { .. } => "NOT_FOUND",
            Error::DuplicateAssignment { .. } => "DUPLICATE_ASSIGNMENT",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Conflict(_) => "CONFLICT",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
