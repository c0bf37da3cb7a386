//! In-memory database adapter for testing and local development.

use crate::error::{DbError, DbResult};
use crate::traits::DocumentDatabase;
use crate::value::{DocMap, Node};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// In-memory [`DocumentDatabase`] with collection/document path semantics.
///
/// Documents live at paths with an even number of segments
/// (`collection/doc`, `collection/doc/sub/doc`, ...); collections have an odd
/// number. Merge writes honor the field-deletion sentinel by removing keys;
/// overwrite writes drop sentinels instead of storing them.
pub struct MemoryDb {
    name: String,
    docs: RwLock<HashMap<String, DocMap>>,
    failing_writes: RwLock<HashSet<String>>,
    failing_reads: RwLock<HashSet<String>>,
}

impl MemoryDb {
    /// Create an empty database with the given identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docs: RwLock::new(HashMap::new()),
            failing_writes: RwLock::new(HashSet::new()),
            failing_reads: RwLock::new(HashSet::new()),
        }
    }

    /// Seed a document directly, bypassing path-shape validation of writes.
    pub async fn seed(&self, doc_path: &str, data: DocMap) {
        self.docs.write().await.insert(doc_path.to_string(), data);
    }

    /// Make every subsequent write to `doc_path` fail.
    pub async fn fail_writes_to(&self, doc_path: &str) {
        self.failing_writes
            .write()
            .await
            .insert(doc_path.to_string());
    }

    /// Make every subsequent read of `doc_path` fail.
    pub async fn fail_reads_from(&self, doc_path: &str) {
        self.failing_reads
            .write()
            .await
            .insert(doc_path.to_string());
    }

    /// Snapshot the full database contents.
    pub async fn dump(&self) -> HashMap<String, DocMap> {
        self.docs.read().await.clone()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    /// Whether the database holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }

    fn validate_doc_path(path: &str) -> DbResult<()> {
        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() < 2
            || segments.len() % 2 != 0
            || segments.iter().any(|s| s.is_empty())
        {
            return Err(DbError::InvalidDocPath {
                path: path.to_string(),
            });
        }
        Ok(())
    }

    async fn check_write(&self, doc_path: &str) -> DbResult<()> {
        Self::validate_doc_path(doc_path)?;
        if self.failing_writes.read().await.contains(doc_path) {
            return Err(DbError::WriteFailed {
                path: doc_path.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

/// Merge `data` into `target` field by field, recursing into nested maps.
/// A field-deletion sentinel removes the key instead of storing a value.
fn merge_into(target: &mut DocMap, data: &DocMap) {
    for (key, value) in data {
        match value {
            Node::Delete => {
                target.remove(key);
            }
            Node::Map(incoming) => match target.get_mut(key) {
                Some(Node::Map(existing)) => merge_into(existing, incoming),
                _ => {
                    target.insert(key.clone(), Node::Map(strip_deletes(incoming)));
                }
            },
            other => {
                target.insert(key.clone(), other.clone());
            }
        }
    }
}

/// Copy a document map, dropping any field-deletion sentinels.
fn strip_deletes(data: &DocMap) -> DocMap {
    data.iter()
        .filter(|(_, v)| !v.is_delete())
        .map(|(k, v)| match v {
            Node::Map(m) => (k.clone(), Node::Map(strip_deletes(m))),
            other => (k.clone(), other.clone()),
        })
        .collect()
}

#[async_trait]
impl DocumentDatabase for MemoryDb {
    async fn get_doc_data(&self, doc_path: &str) -> DbResult<DocMap> {
        Self::validate_doc_path(doc_path)?;
        if self.failing_reads.read().await.contains(doc_path) {
            return Err(DbError::ReadFailed {
                path: doc_path.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(self
            .docs
            .read()
            .await
            .get(doc_path)
            .cloned()
            .unwrap_or_default())
    }

    async fn gen_doc_path(&self, col_path: &str) -> DbResult<String> {
        let segments: Vec<&str> = col_path.split('/').collect();
        if segments.is_empty()
            || segments.len() % 2 == 0
            || segments.iter().any(|s| s.is_empty())
        {
            return Err(DbError::InvalidCollectionPath {
                path: col_path.to_string(),
            });
        }
        Ok(format!("{}/{}", col_path, uuid::Uuid::new_v4().simple()))
    }

    async fn update_doc(&self, doc_path: &str, data: &DocMap) -> DbResult<()> {
        self.check_write(doc_path).await?;
        let mut docs = self.docs.write().await;
        let doc = docs.entry(doc_path.to_string()).or_default();
        merge_into(doc, data);
        Ok(())
    }

    async fn set_doc(&self, doc_path: &str, data: &DocMap) -> DbResult<()> {
        self.check_write(doc_path).await?;
        self.docs
            .write()
            .await
            .insert(doc_path.to_string(), strip_deletes(data));
        Ok(())
    }

    async fn delete_doc(&self, doc_path: &str) -> DbResult<()> {
        self.check_write(doc_path).await?;
        self.docs.write().await.remove(doc_path);
        Ok(())
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}
