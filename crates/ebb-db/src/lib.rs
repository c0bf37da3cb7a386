//! Document database contract and value tree for the ebb migration engine.
//!
//! This crate defines what a schemaless document database looks like to the
//! engine: a tree-shaped [`Node`] value model with database-native leaves
//! (timestamps, document references, the field-deletion sentinel), the
//! [`DocumentDatabase`] trait the engine drives, and an in-memory adapter
//! ([`MemoryDb`]) with collection/document semantics for tests and local
//! development.
//!
//! # Example
//!
//! ```
//! use ebb_db::{doc_map_from_json, DocumentDatabase, MemoryDb};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let db = MemoryDb::new("demo");
//! db.set_doc("users/u1", &doc_map_from_json(json!({"name": "ada"})))
//!     .await
//!     .unwrap();
//!
//! let doc = db.get_doc_data("users/u1").await.unwrap();
//! assert_eq!(doc, doc_map_from_json(json!({"name": "ada"})));
//!
//! // Missing documents read back as empty, not as errors.
//! assert!(db.get_doc_data("users/absent").await.unwrap().is_empty());
//! # }
//! ```

mod error;
mod memory;
mod traits;
mod value;

pub use error::{DbError, DbResult};
pub use memory::MemoryDb;
pub use traits::DocumentDatabase;
pub use value::{doc_map_from_json, DocMap, DocRef, Node};
