//! The database surface the migration engine depends on.

use crate::error::DbResult;
use crate::value::{DocMap, DocRef, Node};
use async_trait::async_trait;

/// Abstract document database client.
///
/// The migration engine only ever talks to a database through this trait, so
/// any collections-of-documents backend can be driven by implementing it.
/// Implementations are shared (`Arc`) and externally synchronized; the engine
/// issues calls sequentially and adds no coordination of its own.
#[async_trait]
pub trait DocumentDatabase: Send + Sync {
    /// Read the current body of the document at `doc_path`.
    ///
    /// A missing document is not an error: implementations return an empty
    /// map so callers can treat "absent" and "empty" uniformly.
    async fn get_doc_data(&self, doc_path: &str) -> DbResult<DocMap>;

    /// Produce a fresh, unique document path inside the named collection.
    async fn gen_doc_path(&self, col_path: &str) -> DbResult<String>;

    /// Merge `data` into the document at `doc_path`, creating it if needed.
    ///
    /// Field-deletion sentinels inside `data` remove the corresponding keys.
    async fn update_doc(&self, doc_path: &str, data: &DocMap) -> DbResult<()>;

    /// Overwrite the document at `doc_path` with `data`.
    async fn set_doc(&self, doc_path: &str, data: &DocMap) -> DbResult<()>;

    /// Remove the document at `doc_path`.
    async fn delete_doc(&self, doc_path: &str) -> DbResult<()>;

    /// The native field-deletion sentinel, for embedding in nested data.
    fn delete_field(&self) -> Node {
        Node::Delete
    }

    /// Construct a native document-reference value from a path string.
    fn ref_field(&self, doc_path: &str) -> Node {
        Node::Ref(DocRef::new(doc_path))
    }

    /// An identifier for this database, embedded in persisted migrations so
    /// a replay can be sanity-checked against its intended target.
    fn name(&self) -> String;
}
