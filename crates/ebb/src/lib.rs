//! Staging-and-migration engine for schemaless document databases.
//!
//! An operator stages intended mutations (add, set, update, delete) against
//! known document paths. The engine fetches each affected document's current
//! state, solves for the post-image, renders a reviewable diff, executes the
//! batch, and persists both the forward migration and a reverse migration
//! able to restore the pre-image.
//!
//! # Core pieces
//!
//! - [`codec`]: bridges database-native leaves (timestamps, document
//!   references, the field-deletion sentinel) to JSON-safe trees.
//! - [`diff`]: RFC 7396 merge-patch computation and application, plus the
//!   line-oriented pretty diff.
//! - [`Change`]: one document-scoped unit of work; solves for its
//!   after-image, rollback patch, and diff.
//! - [`Migrator`]: a named batch of changes; validates, solves, presents,
//!   executes, and persists the forward/reverse file pair.
//! - [`Stager`]: converts operator intents into staged changes.
//!
//! # Example
//!
//! ```
//! use ebb::{Migrator, PlainTheme};
//! use ebb_db::{doc_map_from_json, DocumentDatabase, MemoryDb};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Arc::new(MemoryDb::new("demo"));
//! db.seed("users/u1", doc_map_from_json(json!({"role": "guest"}))).await;
//!
//! let dir = tempfile::tempdir()?;
//! let mut migrator = Migrator::new(dir.path(), db.clone(), "promote")
//!     .with_theme(Arc::new(PlainTheme));
//!
//! migrator
//!     .stage()
//!     .update("users/u1", doc_map_from_json(json!({"role": "admin"})))
//!     .await?;
//! migrator.prep()?;
//! migrator.run().await?;
//!
//! let doc = db.get_doc_data("users/u1").await?;
//! assert_eq!(doc, doc_map_from_json(json!({"role": "admin"})));
//! assert!(dir.path().join("promote.json").exists());
//! assert!(dir.path().join("promote_rollback.json").exists());
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod diff;

mod change;
mod error;
mod migrator;
mod stager;
mod store;
mod theme;

pub use change::{Change, Command};
pub use error::{MigrateError, MigrateResult, SolveError};
pub use migrator::{Migration, Migrator, MigratorConfig, WorkUnit};
pub use stager::Stager;
pub use theme::{AnsiTheme, DiffTheme, PlainTheme};

pub use ebb_db::{doc_map_from_json, DbError, DbResult, DocMap, DocRef, DocumentDatabase, Node};
