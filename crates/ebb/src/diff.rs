//! JSON merge-patch computation, application, and pretty rendering.
//!
//! Merge patches follow RFC 7396: `null` deletes a key, nested objects merge
//! recursively, and arrays are replaced atomically. The rollback derivation
//! leans on the atomic-array rule, so no structural array diffing happens
//! anywhere in this module.

use crate::theme::DiffTheme;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Compute the smallest merge patch that turns `original` into `target`.
///
/// Keys present in `original` but absent from `target` appear in the patch
/// with `null` values. Equal subtrees are omitted. When the two roots are not
/// both objects the patch is `target` itself.
pub fn merge_patch(original: &Value, target: &Value) -> Value {
    match (original, target) {
        (Value::Object(from), Value::Object(to)) => {
            let mut patch = Map::new();
            for (key, from_value) in from {
                match to.get(key) {
                    None => {
                        patch.insert(key.clone(), Value::Null);
                    }
                    Some(to_value) if to_value == from_value => {}
                    Some(to_value) => {
                        if from_value.is_object() && to_value.is_object() {
                            patch.insert(key.clone(), merge_patch(from_value, to_value));
                        } else {
                            patch.insert(key.clone(), to_value.clone());
                        }
                    }
                }
            }
            for (key, to_value) in to {
                if !from.contains_key(key) {
                    patch.insert(key.clone(), to_value.clone());
                }
            }
            Value::Object(patch)
        }
        _ => target.clone(),
    }
}

/// Apply a merge patch to `original` per RFC 7396.
pub fn apply_merge_patch(original: &Value, patch: &Value) -> Value {
    match patch {
        Value::Object(entries) => {
            let mut result = match original {
                Value::Object(existing) => existing.clone(),
                _ => Map::new(),
            };
            for (key, patch_value) in entries {
                if patch_value.is_null() {
                    result.remove(key);
                } else {
                    let base = result.get(key).cloned().unwrap_or(Value::Null);
                    result.insert(key.clone(), apply_merge_patch(&base, patch_value));
                }
            }
            Value::Object(result)
        }
        _ => patch.clone(),
    }
}

/// Render a line-oriented diff of `before` vs `after`.
///
/// Additions are prefixed `+ `, removals `- `, and changed values are joined
/// by ` -> `. Matching subtrees are elided; an empty string means the two
/// trees are equal. All decoration goes through `theme`.
pub fn pretty(before: &Value, after: &Value, theme: &dyn DiffTheme) -> String {
    if before == after {
        return String::new();
    }
    match (before, after) {
        (Value::Object(b), Value::Object(a)) => {
            let mut out = String::from("{\n");
            render_entries(b, a, 1, theme, &mut out);
            out.push('}');
            out
        }
        _ => format!("{before}{}{after}", theme.changed(" -> ")),
    }
}

fn render_entries(
    before: &Map<String, Value>,
    after: &Map<String, Value>,
    depth: usize,
    theme: &dyn DiffTheme,
    out: &mut String,
) {
    let indent = "    ".repeat(depth);
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    for key in keys {
        match (before.get(key), after.get(key)) {
            (Some(b), Some(a)) if b == a => {}
            (Some(Value::Object(b)), Some(Value::Object(a))) => {
                out.push_str(&format!("{indent}\"{key}\": {{\n"));
                render_entries(b, a, depth + 1, theme, out);
                out.push_str(&format!("{indent}}},\n"));
            }
            (Some(b), Some(a)) => {
                out.push_str(&format!(
                    "{indent}\"{key}\": {b}{}{a},\n",
                    theme.changed(" -> ")
                ));
            }
            (None, Some(a)) => {
                out.push_str(&format!("{indent}{}\"{key}\": {a},\n", theme.added("+ ")));
            }
            (Some(b), None) => {
                out.push_str(&format!(
                    "{indent}{}\"{key}\": {b},\n",
                    theme.removed("- ")
                ));
            }
            (None, None) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::PlainTheme;
    use serde_json::json;

    #[test]
    fn patch_between_equal_values_is_empty() {
        let v = json!({"a": 1, "b": {"c": [1, 2]}});
        assert_eq!(merge_patch(&v, &v), json!({}));
    }

    #[test]
    fn missing_keys_become_null() {
        let patch = merge_patch(&json!({"a": 1, "b": 2}), &json!({"a": 1}));
        assert_eq!(patch, json!({"b": null}));
    }

    #[test]
    fn arrays_are_replaced_atomically() {
        let patch = merge_patch(&json!({"c": [1, 2, 3, 4]}), &json!({"c": [1, 2, 6]}));
        assert_eq!(patch, json!({"c": [1, 2, 6]}));
    }

    #[test]
    fn nested_objects_diff_recursively() {
        let patch = merge_patch(
            &json!({"e": {"f": "foo", "g": 7.8}}),
            &json!({"e": {"f": false, "g": 7.8}}),
        );
        assert_eq!(patch, json!({"e": {"f": false}}));
    }

    #[test]
    fn apply_follows_rfc_7396() {
        let doc = json!({"a": "b", "c": {"d": "e", "f": "g"}});
        let patch = json!({"a": "z", "c": {"f": null}});
        assert_eq!(
            apply_merge_patch(&doc, &patch),
            json!({"a": "z", "c": {"d": "e"}})
        );

        // A non-object patch replaces the document wholesale.
        assert_eq!(apply_merge_patch(&doc, &json!([1, 2])), json!([1, 2]));

        // Patching a non-object starts from an empty object.
        assert_eq!(
            apply_merge_patch(&json!("scalar"), &json!({"a": 1})),
            json!({"a": 1})
        );
    }

    #[test]
    fn compute_then_apply_round_trips() {
        let original = json!({"a": "foo", "b": "bar", "c": [1, 2, 3, 4], "d": false,
                              "e": {"f": "foo", "g": 7.8}});
        let target = json!({"a": "far", "c": [1, 2, 6], "d": true,
                            "e": {"f": false, "g": 7.8}, "h": 1000});
        let patch = merge_patch(&original, &target);
        assert_eq!(apply_merge_patch(&original, &patch), target);
    }

    #[test]
    fn pretty_elides_matches_and_marks_changes() {
        let before = json!({"a": "foo", "b": "bar", "e": {"f": "foo", "g": 7.8}});
        let after = json!({"a": "far", "e": {"f": false, "g": 7.8}, "h": 1000});
        let rendered = pretty(&before, &after, &PlainTheme);
        assert_eq!(
            rendered,
            "{\n    \"a\": \"foo\" -> \"far\",\n    - \"b\": \"bar\",\n    \"e\": {\n        \"f\": \"foo\" -> false,\n    },\n    + \"h\": 1000,\n}"
        );
    }

    #[test]
    fn pretty_of_equal_trees_is_empty() {
        let v = json!({"a": 1});
        assert_eq!(pretty(&v, &v, &PlainTheme), "");
    }
}
