//! Document value tree with database-native leaves.
//!
//! A document is a tree of JSON-shaped values plus three leaves that plain
//! JSON cannot carry: timestamps, references to other documents, and the
//! write-only field-deletion sentinel. The migration engine's codec is
//! responsible for bridging those leaves to portable JSON; this module only
//! defines the in-memory shape.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// A document body: string keys mapped to value trees, in canonical key order.
pub type DocMap = BTreeMap<String, Node>;

/// A reference to another document, held as a database-relative path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocRef {
    path: String,
}

impl DocRef {
    /// Create a reference from a database-relative document path.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// The database-relative path this reference points at.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// One vertex of a document tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Node {
    /// JSON null.
    #[default]
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON number (integer or float, as stored by `serde_json`).
    Number(serde_json::Number),
    /// JSON string.
    String(String),
    /// Database-native timestamp.
    Timestamp(DateTime<Utc>),
    /// Database-native reference to another document.
    Ref(DocRef),
    /// Write-only marker: the database removes the key this value is set on.
    Delete,
    /// Ordered sequence of values.
    Array(Vec<Node>),
    /// Nested document.
    Map(DocMap),
}

impl Node {
    /// Borrow this node as a document map, if it is one.
    pub fn as_map(&self) -> Option<&DocMap> {
        match self {
            Node::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow this node as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Node]> {
        match self {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Whether this node is the field-deletion sentinel.
    pub fn is_delete(&self) -> bool {
        matches!(self, Node::Delete)
    }

    /// Convenience constructor for a timestamp leaf.
    pub fn timestamp(at: DateTime<Utc>) -> Self {
        Node::Timestamp(at)
    }

    /// Convenience constructor for a document-reference leaf.
    pub fn reference(path: impl Into<String>) -> Self {
        Node::Ref(DocRef::new(path))
    }
}

impl From<bool> for Node {
    fn from(v: bool) -> Self {
        Node::Bool(v)
    }
}

impl From<i64> for Node {
    fn from(v: i64) -> Self {
        Node::Number(serde_json::Number::from(v))
    }
}

impl From<f64> for Node {
    fn from(v: f64) -> Self {
        serde_json::Number::from_f64(v).map_or(Node::Null, Node::Number)
    }
}

impl From<&str> for Node {
    fn from(v: &str) -> Self {
        Node::String(v.to_string())
    }
}

impl From<String> for Node {
    fn from(v: String) -> Self {
        Node::String(v)
    }
}

impl From<DateTime<Utc>> for Node {
    fn from(v: DateTime<Utc>) -> Self {
        Node::Timestamp(v)
    }
}

impl From<DocRef> for Node {
    fn from(v: DocRef) -> Self {
        Node::Ref(v)
    }
}

impl From<Vec<Node>> for Node {
    fn from(v: Vec<Node>) -> Self {
        Node::Array(v)
    }
}

impl From<DocMap> for Node {
    fn from(v: DocMap) -> Self {
        Node::Map(v)
    }
}

impl From<serde_json::Value> for Node {
    /// Structural conversion from plain JSON. Sentinel strings are NOT
    /// interpreted here; decoding marked strings is the codec's job.
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Node::Null,
            serde_json::Value::Bool(b) => Node::Bool(b),
            serde_json::Value::Number(n) => Node::Number(n),
            serde_json::Value::String(s) => Node::String(s),
            serde_json::Value::Array(items) => {
                Node::Array(items.into_iter().map(Node::from).collect())
            }
            serde_json::Value::Object(entries) => Node::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Node::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Build a `DocMap` from a JSON object literal.
///
/// Non-object input yields an empty document. Intended for fixtures and
/// adapters; sentinel strings are passed through untouched.
pub fn doc_map_from_json(value: serde_json::Value) -> DocMap {
    match Node::from(value) {
        Node::Map(m) => m,
        _ => DocMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_is_structural() {
        let node = Node::from(json!({"a": 1, "b": [true, null], "c": {"d": "x"}}));
        let map = node.as_map().unwrap();
        assert_eq!(map["a"], Node::from(1i64));
        assert_eq!(
            map["b"],
            Node::Array(vec![Node::Bool(true), Node::Null])
        );
        assert_eq!(map["c"].as_map().unwrap()["d"], Node::from("x"));
    }

    #[test]
    fn doc_map_from_json_rejects_non_objects() {
        assert!(doc_map_from_json(json!([1, 2, 3])).is_empty());
        assert!(doc_map_from_json(json!("scalar")).is_empty());
    }

    #[test]
    fn sentinel_strings_are_not_interpreted() {
        let map = doc_map_from_json(json!({"t": "<time>2020-01-01T00:00:00.000Z<time>"}));
        assert!(matches!(map["t"], Node::String(_)));
    }

    #[test]
    fn doc_ref_display_is_the_path() {
        let r = DocRef::new("users/abc");
        assert_eq!(r.to_string(), "users/abc");
        assert_eq!(Node::reference("users/abc"), Node::Ref(r));
    }
}
