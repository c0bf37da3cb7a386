//! One document-scoped unit of work and its solver.
//!
//! A [`Change`] holds the `(path, before, patch, command)` tuple an operator
//! staged and solves for the derived fields: the after-image, the rollback
//! merge patch, and the reviewable diff. Solving never touches the database;
//! execution happens later through [`Change::push_to`].

use crate::codec;
use crate::diff;
use crate::error::SolveError;
use crate::theme::{DiffTheme, PlainTheme};
use ebb_db::{DbResult, DocMap, DocumentDatabase};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

/// The kind of write a change performs.
///
/// Persisted migrations carry the integer tag, so the discriminants are part
/// of the wire format and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Command {
    /// Command was not persisted; it is re-inferred from before/after.
    #[default]
    Unknown,
    /// Deep merge-patch of the existing document.
    Update,
    /// Overwrite the whole document.
    Set,
    /// Create a new document at a freshly generated path.
    Add,
    /// Remove the document.
    Delete,
}

impl Command {
    /// Lowercase name, as shown in presentation headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Unknown => "unknown",
            Command::Update => "update",
            Command::Set => "set",
            Command::Add => "add",
            Command::Delete => "delete",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> Self {
        match command {
            Command::Unknown => 0,
            Command::Update => 1,
            Command::Set => 2,
            Command::Add => 3,
            Command::Delete => 4,
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = String;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Command::Unknown),
            1 => Ok(Command::Update),
            2 => Ok(Command::Set),
            3 => Ok(Command::Add),
            4 => Ok(Command::Delete),
            other => Err(format!("unknown command tag: {other}")),
        }
    }
}

/// Memoized JSON-encoded views of a change's trees, so repeated solving
/// steps do not rewalk the same documents.
#[derive(Debug, Default)]
struct EncodedViews {
    before: OnceLock<Value>,
    patch: OnceLock<Value>,
    after: OnceLock<Value>,
}

/// One change on one document.
///
/// A change must contain enough data points to be solved: given a before and
/// a patch, the solver derives the after-image, the rollback patch, and the
/// pretty diff. Failures are captured on the change itself so a whole batch
/// can be reviewed, partial failures included.
#[derive(Debug)]
pub struct Change {
    doc_path: String,
    before: Option<DocMap>,
    patch: Option<DocMap>,
    after: Option<DocMap>,
    command: Command,
    pretty_diff: Option<String>,
    rollback: Option<Value>,
    err_state: Option<SolveError>,
    encoded: EncodedViews,
}

impl Change {
    /// Create an unsolved change. The error state reads "unsolved" until
    /// [`solve`](Self::solve) succeeds.
    pub fn new(
        doc_path: impl Into<String>,
        before: Option<DocMap>,
        patch: Option<DocMap>,
        command: Command,
    ) -> Self {
        Self {
            doc_path: doc_path.into(),
            before,
            patch,
            after: None,
            command,
            pretty_diff: None,
            rollback: None,
            err_state: Some(SolveError::Unsolved),
            encoded: EncodedViews::default(),
        }
    }

    /// Solve for all derived values given the current state.
    ///
    /// Runs the fixed inference sequence (after, command, pretty diff,
    /// rollback). The first failing step is captured as the change's error
    /// state and also returned. Re-solving resets every derived field.
    pub fn solve(&mut self) -> Result<(), SolveError> {
        self.err_state = None;
        self.after = None;
        self.pretty_diff = None;
        self.rollback = None;
        self.encoded = EncodedViews::default();

        if let Err(err) = self.run_inference() {
            self.err_state = Some(err.clone());
            return Err(err);
        }
        Ok(())
    }

    fn run_inference(&mut self) -> Result<(), SolveError> {
        self.infer_after()?;
        self.infer_command()?;
        self.infer_pretty_diff()?;
        self.infer_rollback()?;
        Ok(())
    }

    /// Solve for the after-image.
    fn infer_after(&mut self) -> Result<(), SolveError> {
        match self.command {
            Command::Set | Command::Add => {
                self.after = self.patch.clone();
                return Ok(());
            }
            Command::Delete => {
                self.after = Some(DocMap::new());
                return Ok(());
            }
            // Update applies the patch; Unknown replays a persisted merge
            // patch the same way and infers its command afterwards.
            Command::Update | Command::Unknown => {}
        }

        let applied = {
            let (Some(before), Some(patch)) = (self.encoded_before(), self.encoded_patch())
            else {
                return Err(SolveError::AfterInputs);
            };
            diff::apply_merge_patch(before, patch)
        };
        self.after = Some(codec::decode_map(&applied));
        let _ = self.encoded.after.set(applied);
        Ok(())
    }

    /// Solve for the command. Only runs when the staged command is Unknown,
    /// which happens when a migration was persisted without one.
    fn infer_command(&mut self) -> Result<(), SolveError> {
        if self.command != Command::Unknown {
            return Ok(());
        }
        let Some(after) = &self.after else {
            return Err(SolveError::CommandInputs);
        };
        if after.is_empty() {
            self.command = Command::Delete;
            return Ok(());
        }
        let differs = {
            let after_json = self.encoded_after().cloned().unwrap_or(Value::Null);
            let patch_json = self.encoded_patch().cloned().unwrap_or(Value::Null);
            after_json != patch_json
        };
        self.command = if differs { Command::Update } else { Command::Set };
        Ok(())
    }

    /// Solve for the reviewable diff. An empty rendering is valid and is
    /// later presented as "no changes".
    fn infer_pretty_diff(&mut self) -> Result<(), SolveError> {
        let rendered = {
            let (Some(before), Some(after)) = (self.encoded_before(), self.encoded_after())
            else {
                return Err(SolveError::DiffInputs);
            };
            diff::pretty(before, after, &PlainTheme)
        };
        self.pretty_diff = Some(rendered);
        Ok(())
    }

    /// Solve for the rollback merge patch: applying it to the after-image
    /// reconstructs the before-image at the encoded layer.
    fn infer_rollback(&mut self) -> Result<(), SolveError> {
        let patch = {
            let (Some(before), Some(after)) = (self.encoded_before(), self.encoded_after())
            else {
                return Err(SolveError::RollbackInputs);
            };
            diff::merge_patch(after, before)
        };
        self.rollback = Some(patch);
        Ok(())
    }

    /// Execute this change against `database`.
    ///
    /// `transform` sees the patch immediately before the write and may
    /// substitute sentinel forms; identity is the usual default. Errors
    /// propagate verbatim.
    pub async fn push_to<F>(&self, database: &dyn DocumentDatabase, transform: F) -> DbResult<()>
    where
        F: FnOnce(&DocMap) -> DocMap,
    {
        let empty = DocMap::new();
        let data = transform(self.patch.as_ref().unwrap_or(&empty));
        match self.command {
            Command::Update => database.update_doc(&self.doc_path, &data).await,
            Command::Set | Command::Add => database.set_doc(&self.doc_path, &data).await,
            Command::Delete | Command::Unknown => database.delete_doc(&self.doc_path).await,
        }
    }

    /// Render this change for review: a `(header, body)` pair.
    pub fn present(&self, theme: &dyn DiffTheme) -> (String, String) {
        let header = format!(
            "Target: {} >> [{}]",
            theme.target(&self.doc_path),
            self.command.as_str().to_uppercase()
        );

        let body = if let Some(err) = &self.err_state {
            format!("< !!! ERROR STATE !!! >\n{err}\n")
        } else if self.pretty_diff.as_deref().is_some_and(str::is_empty) {
            "< no changes >\n".to_string()
        } else {
            match (self.encoded_before(), self.encoded_after()) {
                (Some(before), Some(after)) => {
                    format!("{}\n", diff::pretty(before, after, theme))
                }
                _ => format!("{}\n", self.pretty_diff.clone().unwrap_or_default()),
            }
        };
        (header, body)
    }

    /// The target document path.
    pub fn doc_path(&self) -> &str {
        &self.doc_path
    }

    /// The staged (or inferred) command.
    pub fn command(&self) -> Command {
        self.command
    }

    /// The pre-image fetched at staging time.
    pub fn before(&self) -> Option<&DocMap> {
        self.before.as_ref()
    }

    /// The staged patch.
    pub fn patch(&self) -> Option<&DocMap> {
        self.patch.as_ref()
    }

    /// The solved after-image.
    pub fn after(&self) -> Option<&DocMap> {
        self.after.as_ref()
    }

    /// The solved rollback merge patch, at the encoded layer.
    pub fn rollback(&self) -> Option<&Value> {
        self.rollback.as_ref()
    }

    /// The solved plain-text diff.
    pub fn pretty_diff(&self) -> Option<&str> {
        self.pretty_diff.as_deref()
    }

    /// The captured solve failure, if any.
    pub fn err_state(&self) -> Option<&SolveError> {
        self.err_state.as_ref()
    }

    /// The patch as it should appear in a persisted work unit: codec-encoded,
    /// omitted when empty or absent.
    pub(crate) fn unit_patch(&self) -> Option<Value> {
        self.patch
            .as_ref()
            .filter(|map| !map.is_empty())
            .map(codec::encode_map)
    }

    fn encoded_before(&self) -> Option<&Value> {
        let before = self.before.as_ref()?;
        Some(self.encoded.before.get_or_init(|| codec::encode_map(before)))
    }

    fn encoded_patch(&self) -> Option<&Value> {
        let patch = self.patch.as_ref()?;
        Some(self.encoded.patch.get_or_init(|| codec::encode_map(patch)))
    }

    fn encoded_after(&self) -> Option<&Value> {
        let after = self.after.as_ref()?;
        Some(self.encoded.after.get_or_init(|| codec::encode_map(after)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebb_db::{doc_map_from_json, Node};
    use serde_json::json;

    fn big() -> DocMap {
        doc_map_from_json(json!({
            "a": "foo",
            "b": "bar",
            "c": [1, 2, 3, 4],
            "d": false,
            "e": {"f": "foo", "g": 7.8},
        }))
    }

    fn small() -> DocMap {
        doc_map_from_json(json!({
            "a": "far",
            "c": [1, 2, 6],
            "d": true,
            "e": {"f": false},
            "h": 1000,
        }))
    }

    fn merged() -> DocMap {
        doc_map_from_json(json!({
            "a": "far",
            "b": "bar",
            "c": [1, 2, 6],
            "d": true,
            "e": {"f": false, "g": 7.8},
            "h": 1000,
        }))
    }

    #[test]
    fn add_takes_patch_verbatim_and_rolls_back_to_nothing() {
        let mut change = Change::new(
            "things/t1",
            Some(DocMap::new()),
            Some(big()),
            Command::Add,
        );
        change.solve().unwrap();

        assert_eq!(change.command(), Command::Add);
        assert_eq!(change.after(), Some(&big()));
        assert!(change.err_state().is_none());
        assert_eq!(
            change.rollback(),
            Some(&json!({"a": null, "b": null, "c": null, "d": null, "e": null}))
        );
    }

    #[test]
    fn update_merges_and_rolls_back_to_before() {
        let mut change = Change::new("things/t1", Some(big()), Some(small()), Command::Update);
        change.solve().unwrap();

        assert_eq!(change.command(), Command::Update);
        assert_eq!(change.after(), Some(&merged()));
        assert_eq!(
            change.rollback(),
            Some(&json!({
                "a": "foo",
                "c": [1, 2, 3, 4],
                "d": false,
                "e": {"f": "foo"},
                "h": null,
            }))
        );
    }

    #[test]
    fn delete_yields_empty_after_and_full_rollback() {
        let mut change = Change::new(
            "things/t1",
            Some(big()),
            Some(DocMap::new()),
            Command::Delete,
        );
        change.solve().unwrap();

        assert_eq!(change.command(), Command::Delete);
        assert_eq!(change.after(), Some(&DocMap::new()));
        assert_eq!(
            change.rollback(),
            Some(&json!({
                "a": "foo",
                "b": "bar",
                "c": [1, 2, 3, 4],
                "d": false,
                "e": {"f": "foo", "g": 7.8},
            }))
        );
    }

    #[test]
    fn set_overwrites_and_rollback_restores_dropped_keys() {
        let mut change = Change::new("things/t1", Some(big()), Some(small()), Command::Set);
        change.solve().unwrap();

        assert_eq!(change.command(), Command::Set);
        assert_eq!(change.after(), Some(&small()));
        assert_eq!(
            change.rollback(),
            Some(&json!({
                "a": "foo",
                "b": "bar",
                "c": [1, 2, 3, 4],
                "d": false,
                "e": {"f": "foo", "g": 7.8},
                "h": null,
            }))
        );
    }

    #[test]
    fn unknown_with_differing_patch_becomes_update() {
        let mut change = Change::new("things/t1", Some(big()), Some(small()), Command::Unknown);
        change.solve().unwrap();

        assert_eq!(change.command(), Command::Update);
        assert_eq!(change.after(), Some(&merged()));
        assert_eq!(
            change.rollback(),
            Some(&json!({
                "a": "foo",
                "c": [1, 2, 3, 4],
                "d": false,
                "e": {"f": "foo"},
                "h": null,
            }))
        );
    }

    #[test]
    fn unknown_with_matching_patch_becomes_set() {
        let mut change = Change::new(
            "things/t1",
            Some(DocMap::new()),
            Some(big()),
            Command::Unknown,
        );
        change.solve().unwrap();
        assert_eq!(change.command(), Command::Set);
        assert_eq!(change.after(), Some(&big()));
    }

    #[test]
    fn unknown_with_emptying_patch_becomes_delete() {
        let patch = doc_map_from_json(json!({
            "a": null, "b": null, "c": null, "d": null, "e": null,
        }));
        let mut change = Change::new("things/t1", Some(big()), Some(patch), Command::Unknown);
        change.solve().unwrap();
        assert_eq!(change.command(), Command::Delete);
        assert_eq!(change.after(), Some(&DocMap::new()));
    }

    #[test]
    fn update_without_inputs_captures_error_state() {
        let mut change = Change::new("things/t1", None, Some(small()), Command::Update);
        assert_eq!(change.solve(), Err(SolveError::AfterInputs));
        assert_eq!(change.err_state(), Some(&SolveError::AfterInputs));
        assert!(change.after().is_none());
    }

    #[test]
    fn unsolved_change_reports_unsolved_state() {
        let change = Change::new("things/t1", Some(big()), Some(small()), Command::Update);
        assert_eq!(change.err_state(), Some(&SolveError::Unsolved));
    }

    #[test]
    fn resolve_clears_a_previous_error_state() {
        let mut change = Change::new("things/t1", None, Some(small()), Command::Update);
        let _ = change.solve();
        assert!(change.err_state().is_some());

        let mut change = Change::new("things/t1", Some(big()), Some(small()), Command::Update);
        change.solve().unwrap();
        assert!(change.err_state().is_none());
    }

    #[test]
    fn delete_sentinel_survives_an_update_solve() {
        let mut patch = doc_map_from_json(json!({"a": "far"}));
        patch.insert("b".to_string(), Node::Delete);

        let mut change = Change::new("things/t1", Some(big()), Some(patch), Command::Update);
        change.solve().unwrap();

        let after = change.after().unwrap();
        assert_eq!(after["b"], Node::Delete);
        let rollback = change.rollback().unwrap();
        assert_eq!(rollback["b"], json!("bar"));
    }

    #[test]
    fn rollback_applied_to_after_restores_before_byte_for_byte() {
        for command in [Command::Update, Command::Set, Command::Delete] {
            let patch = if command == Command::Delete {
                DocMap::new()
            } else {
                small()
            };
            let mut change = Change::new("things/t1", Some(big()), Some(patch), command);
            change.solve().unwrap();

            let after = codec::encode_map(change.after().unwrap());
            let restored = diff::apply_merge_patch(&after, change.rollback().unwrap());
            let before = codec::encode_map(change.before().unwrap());
            assert_eq!(
                serde_json::to_string(&restored).unwrap(),
                serde_json::to_string(&before).unwrap(),
            );
        }
    }

    #[test]
    fn no_change_update_renders_empty_diff() {
        let mut change = Change::new(
            "things/t1",
            Some(big()),
            Some(DocMap::new()),
            Command::Update,
        );
        change.solve().unwrap();
        assert_eq!(change.pretty_diff(), Some(""));

        let (_, body) = change.present(&PlainTheme);
        assert_eq!(body, "< no changes >\n");
    }

    #[test]
    fn present_shows_target_command_and_errors() {
        let mut change = Change::new("things/t1", Some(big()), Some(small()), Command::Update);
        change.solve().unwrap();
        let (header, body) = change.present(&PlainTheme);
        assert_eq!(header, "Target: things/t1 >> [UPDATE]");
        assert!(body.contains("\"a\": \"foo\" -> \"far\","));

        let mut broken = Change::new("things/t2", None, None, Command::Update);
        let _ = broken.solve();
        let (_, body) = broken.present(&PlainTheme);
        assert!(body.contains("< !!! ERROR STATE !!! >"));
        assert!(body.contains("need before and patch to infer after"));
    }

    #[test]
    fn command_tags_round_trip_through_serde() {
        for (command, tag) in [
            (Command::Unknown, 0u8),
            (Command::Update, 1),
            (Command::Set, 2),
            (Command::Add, 3),
            (Command::Delete, 4),
        ] {
            let encoded = serde_json::to_string(&command).unwrap();
            assert_eq!(encoded, tag.to_string());
            let decoded: Command = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded, command);
        }
        assert!(serde_json::from_str::<Command>("9").is_err());
    }
}
