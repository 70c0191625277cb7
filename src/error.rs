use thiserror::Error;

use crate::store::StoreError;

/// Result type for content operations.
pub type Result<T> = std::result::Result<T, ContentError>;

/// Errors surfaced across the content-store boundary.
///
/// Every operation returns either its success value or exactly one of these.
/// Partial writes that preceded a failure are not compensated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    /// The referenced id has no primary record.
    #[error("content entry not found: {id}")]
    NotFound { id: String },

    /// A store write, delete or increment was rejected, or a read failed for a
    /// reason other than absence.
    #[error("store {operation} failed: {source}")]
    StoreWriteFailed {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// The store could not mint a fresh id.
    #[error("id generation failed: {0}")]
    IdGenerationFailed(String),

    /// The change feed behind a live subscription failed or was closed.
    #[error("live subscription failed: {0}")]
    ListenerError(String),
}

/// Fieldless tag for [`ContentError`], for callers that only branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    StoreWriteFailed,
    IdGenerationFailed,
    ListenerError,
}

impl ContentError {
    pub(crate) fn not_found(id: &str) -> Self {
        ContentError::NotFound { id: id.to_string() }
    }

    pub(crate) fn write(operation: &'static str, source: StoreError) -> Self {
        ContentError::StoreWriteFailed { operation, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ContentError::NotFound { .. } => ErrorKind::NotFound,
            ContentError::StoreWriteFailed { .. } => ErrorKind::StoreWriteFailed,
            ContentError::IdGenerationFailed(_) => ErrorKind::IdGenerationFailed,
            ContentError::ListenerError(_) => ErrorKind::ListenerError,
        }
    }
}
