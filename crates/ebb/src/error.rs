//! Error types for the migration engine.

use ebb_db::DbError;
use thiserror::Error;

/// Result type alias for migrator-level operations.
pub type MigrateResult<T> = Result<T, MigrateError>;

/// A missing-input failure captured onto a [`Change`](crate::Change) while
/// solving.
///
/// These are recorded on the change rather than raised so an operator can
/// review the whole batch, including its failures, in one presentation pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolveError {
    /// The change was constructed but `solve` has not run yet.
    #[error("change has not been solved yet")]
    Unsolved,

    /// Inferring the after-image needs both a before and a patch.
    #[error("need before and patch to infer after")]
    AfterInputs,

    /// Inferring the command needs an after-image.
    #[error("need an after value to infer command")]
    CommandInputs,

    /// Rendering the diff needs both a before and an after-image.
    #[error("need before and after values to infer pretty diff")]
    DiffInputs,

    /// Deriving the rollback needs both a before and an after-image.
    #[error("need before and after values to infer rollback")]
    RollbackInputs,
}

/// Errors raised from migrator-level operations.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Two staged changes target the same document.
    #[error("multiple changes staged against the same document: {path}")]
    DuplicateTarget {
        /// The duplicated document path.
        path: String,
    },

    /// A rollback cannot be built while any change is in an error state.
    #[error("change for {path} is in an error state: {source}")]
    ErrState {
        /// The document path of the failed change.
        path: String,
        /// The captured solve failure.
        source: SolveError,
    },

    /// A migration name is unusable as a storage key.
    #[error("invalid migration name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// A database read or write failed.
    #[error(transparent)]
    Database(#[from] DbError),

    /// A migration file could not be read or written.
    #[error("migration storage i/o: {0}")]
    Io(#[from] std::io::Error),

    /// A migration record could not be encoded or decoded.
    #[error("migration serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}
