//! Error type for database operations.

use thiserror::Error;

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors surfaced by a [`DocumentDatabase`](crate::DocumentDatabase)
/// implementation.
#[derive(Debug, Error)]
pub enum DbError {
    /// A document path did not have the collection/document shape the
    /// backend requires.
    #[error("invalid document path: {path}")]
    InvalidDocPath {
        /// The offending path.
        path: String,
    },

    /// A collection path did not have the shape the backend requires.
    #[error("invalid collection path: {path}")]
    InvalidCollectionPath {
        /// The offending path.
        path: String,
    },

    /// A write against a document failed.
    #[error("write to {path} failed: {message}")]
    WriteFailed {
        /// The target document.
        path: String,
        /// Backend-provided detail.
        message: String,
    },

    /// A read against a document failed.
    #[error("read from {path} failed: {message}")]
    ReadFailed {
        /// The target document.
        path: String,
        /// Backend-provided detail.
        message: String,
    },
}
