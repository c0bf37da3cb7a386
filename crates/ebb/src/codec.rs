//! Serialization bridge between document trees and JSON-safe trees.
//!
//! Three leaf types have no portable JSON form: timestamps, document
//! references, and the field-deletion sentinel. The codec brackets each in a
//! fixed marker string on the way out and reconstructs the native leaf on the
//! way back, so a migration can round-trip through a plain JSON file.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use ebb_db::{DocMap, DocRef, Node};
use serde_json::{Map, Value};

const TIME_MARK: &str = "<time>";
const REF_MARK: &str = "<ref>";
const DELETE_MARK: &str = "<delete>";

/// The encoded form of the field-deletion sentinel.
pub const DELETE_TOKEN: &str = "<delete>!delete<delete>";

/// Stamp format carried between `<time>` markers.
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Encode a document tree into a JSON-safe tree.
pub fn encode(node: &Node) -> Value {
    match node {
        Node::Null => Value::Null,
        Node::Bool(b) => Value::Bool(*b),
        Node::Number(n) => Value::Number(n.clone()),
        Node::String(s) => Value::String(s.clone()),
        Node::Timestamp(at) => Value::String(format!(
            "{TIME_MARK}{}{TIME_MARK}",
            at.format(TIME_FORMAT)
        )),
        Node::Ref(r) => Value::String(format!("{REF_MARK}{}{REF_MARK}", r.path())),
        Node::Delete => Value::String(DELETE_TOKEN.to_string()),
        Node::Array(items) => Value::Array(items.iter().map(encode).collect()),
        Node::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), encode(v)))
                .collect::<Map<String, Value>>(),
        ),
    }
}

/// Encode a document body into a JSON object.
pub fn encode_map(map: &DocMap) -> Value {
    encode(&Node::Map(map.clone()))
}

/// Decode a JSON-safe tree back into a document tree.
///
/// String leaves are tested for the `<time>`, `<ref>`, and `<delete>`
/// markers, in that order. An unparseable timestamp decodes to the zero
/// timestamp rather than failing: persisted migrations were validated by
/// their producer, so recovery is best-effort here.
pub fn decode(value: &Value) -> Node {
    match value {
        Value::Null => Node::Null,
        Value::Bool(b) => Node::Bool(*b),
        Value::Number(n) => Node::Number(n.clone()),
        Value::String(s) => decode_string(s),
        Value::Array(items) => Node::Array(items.iter().map(decode).collect()),
        Value::Object(entries) => Node::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), decode(v)))
                .collect(),
        ),
    }
}

/// Decode a JSON object into a document body. Non-object input yields an
/// empty document.
pub fn decode_map(value: &Value) -> DocMap {
    match decode(value) {
        Node::Map(m) => m,
        _ => DocMap::new(),
    }
}

/// Rewrite merge-patch `null` leaves into the native field-deletion sentinel.
///
/// Under merge-patch semantics `null` means "drop this key", but a document
/// write stores `null` literally. Merge writes therefore substitute the
/// sentinel immediately before pushing, so a replayed rollback unsets keys
/// instead of nulling them. Nulls inside arrays are left alone: arrays are
/// written wholesale and a `null` element is a value there, not a deletion.
pub fn nulls_to_deletes(map: &DocMap) -> DocMap {
    map.iter()
        .map(|(k, v)| (k.clone(), null_to_delete(v)))
        .collect()
}

fn null_to_delete(node: &Node) -> Node {
    match node {
        Node::Null => Node::Delete,
        Node::Map(entries) => Node::Map(nulls_to_deletes(entries)),
        other => other.clone(),
    }
}

/// The zero timestamp unparseable stamps decode to: `0001-01-01T00:00:00Z`.
fn zero_timestamp() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or_default()
}

fn decode_string(s: &str) -> Node {
    if s.starts_with(TIME_MARK) {
        let stamp = s.replace(TIME_MARK, "");
        let at = NaiveDateTime::parse_from_str(&stamp, TIME_FORMAT)
            .map(|naive| naive.and_utc())
            .unwrap_or_else(|_| zero_timestamp());
        Node::Timestamp(at)
    } else if s.starts_with(REF_MARK) {
        Node::Ref(DocRef::new(s.replace(REF_MARK, "")))
    } else if s.starts_with(DELETE_MARK) {
        Node::Delete
    } else {
        Node::String(s.to_string())
    }
}
