use thiserror::Error;

use crate::domain::DocumentKind;
use crate::ports::RepositoryError;
use crate::validation::ValidationError;

/// Failures of the document lifecycle use cases (generate, status, list).
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("A {kind} cannot move from {from} to {to}")]
    InvalidTransition {
        kind: DocumentKind,
        from: String,
        to: String,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl From<RepositoryError> for DocumentError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => DocumentError::NotFound(what),
            other => DocumentError::Persistence(other.to_string()),
        }
    }
}
