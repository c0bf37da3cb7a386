//! Batch orchestration: validate, solve, present, execute, persist.

use crate::change::{Change, Command};
use crate::codec;
use crate::error::{MigrateError, MigrateResult};
use crate::stager::Stager;
use crate::store;
use crate::theme::{AnsiTheme, DiffTheme, PlainTheme};
use chrono::{DateTime, Utc};
use ebb_db::DocumentDatabase;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One change mapped to one document within a persisted migration.
///
/// A migration cannot contain two work units pointing at the same document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkUnit {
    /// Target document path.
    pub doc_path: String,
    /// Codec-encoded patch; omitted when empty or absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Value>,
    /// Integer-tagged command. A record that omits it replays as Unknown
    /// and the solver re-infers the command from before/after.
    #[serde(default)]
    pub command: Command,
}

/// The instructions needed to orchestrate one migration job. Rollbacks take
/// this same form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Migration {
    /// Identifier of the database this migration was built against.
    pub database_name: String,
    /// When the record was produced.
    pub timestamp: DateTime<Utc>,
    /// Whether the migration has been executed.
    pub executed: bool,
    /// The ordered batch of work units.
    pub change_units: Vec<WorkUnit>,
}

/// Migrator settings, loadable from any serde format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigratorConfig {
    /// Human-readable migration name; also the storage key.
    pub name: String,
    /// Directory migration files are written to.
    pub storage_path: PathBuf,
}

/// A named batch of changes against one database.
///
/// The intended call order is sequential: stage, [`prep`](Self::prep),
/// [`present`](Self::present), [`run`](Self::run). Persistence of the
/// forward and reverse migration files happens inside `run`.
pub struct Migrator {
    name: String,
    storage_path: PathBuf,
    database: Arc<dyn DocumentDatabase>,
    theme: Arc<dyn DiffTheme>,
    changes: Vec<Change>,
    has_run: bool,
}

impl Migrator {
    /// Create an empty migrator writing its files under `storage_path`.
    pub fn new(
        storage_path: impl Into<PathBuf>,
        database: Arc<dyn DocumentDatabase>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            storage_path: storage_path.into(),
            database,
            theme: Arc::new(AnsiTheme),
            changes: Vec::new(),
            has_run: false,
        }
    }

    /// Create a migrator from deserialized settings.
    pub fn from_config(config: MigratorConfig, database: Arc<dyn DocumentDatabase>) -> Self {
        Self::new(config.storage_path, database, config.name)
    }

    /// Replace the presentation theme.
    pub fn with_theme(mut self, theme: Arc<dyn DiffTheme>) -> Self {
        self.theme = theme;
        self
    }

    /// The staging surface for appending changes to this batch.
    pub fn stage(&mut self) -> Stager<'_> {
        Stager::new(self)
    }

    /// The migration name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether [`run`](Self::run) has completed.
    pub fn has_run(&self) -> bool {
        self.has_run
    }

    /// The staged changes, in insertion order.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// The directory migration files are written to.
    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    pub(crate) fn database(&self) -> Arc<dyn DocumentDatabase> {
        self.database.clone()
    }

    pub(crate) fn append(&mut self, change: Change) {
        self.changes.push(change);
    }

    /// Reject batches where two changes target the same document.
    fn validate(&self) -> MigrateResult<()> {
        let mut seen = HashSet::new();
        for change in &self.changes {
            if !seen.insert(change.doc_path()) {
                return Err(MigrateError::DuplicateTarget {
                    path: change.doc_path().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Validate the batch, then solve every change.
    ///
    /// Individual solve failures stay on their change so the operator can
    /// review the whole batch, partial failures included. Nothing is pushed
    /// to the database here.
    pub fn prep(&mut self) -> MigrateResult<()> {
        self.validate()?;
        for change in &mut self.changes {
            if let Err(err) = change.solve() {
                tracing::warn!(path = change.doc_path(), %err, "change failed to solve");
            }
        }
        Ok(())
    }

    /// Render the full batch for review using the given theme.
    pub fn render(&self, theme: &dyn DiffTheme) -> String {
        let width = self
            .name
            .len()
            .max(self.database.name().len())
            .max(self.storage_path.display().to_string().len())
            + 26;

        let mut out = separator(width);
        out.push_str(&format!(
            "Migration Name:\t  {}\nDatabase:\t  {}\nStorage Path:\t  {}\nHas Run:\t  {}\n",
            self.name,
            self.database.name(),
            self.storage_path.display(),
            self.has_run,
        ));
        for change in &self.changes {
            let (header, body) = change.present(theme);
            let header_width =
                "Target:  >> []".len() + change.doc_path().len() + change.command().as_str().len();
            let block_width = (header_width + 19).max(longest_line(&body));
            out.push_str(&separator(block_width));
            out.push_str(&header);
            out.push_str("\n\n");
            out.push_str(&body);
        }
        out.push_str(&separator(width));
        out
    }

    /// Print the batch to the terminal and mirror it into the plain-text
    /// `<name>_diff.txt` artifact beside the migration files.
    ///
    /// Presentation never mutates the batch; an artifact-write failure is
    /// logged rather than raised.
    pub async fn present(&self) {
        print!("{}", self.render(self.theme.as_ref()));

        let artifact = self.render(&PlainTheme);
        if !self.storage_path.exists() {
            let _ = tokio::fs::create_dir_all(&self.storage_path).await;
        }
        let path = self.storage_path.join(format!("{}_diff.txt", self.name));
        if let Err(err) = tokio::fs::write(&path, artifact).await {
            tracing::warn!(path = %path.display(), %err, "failed to write diff artifact");
        }
    }

    /// Execute every staged change against the database, in order.
    ///
    /// Per-change push failures are reported and do not abort the batch;
    /// later operators can inspect the persisted rollback to recover. After
    /// the push loop the forward migration is always persisted; the reverse
    /// is persisted only if every change solved cleanly, and a reverse
    /// integrity failure propagates after the forward file is written.
    pub async fn run(&mut self) -> MigrateResult<()> {
        for change in &self.changes {
            // Merge writes substitute field-deletion sentinels for patch
            // nulls; replayed rollbacks depend on this to unset keys.
            let result = match change.command() {
                Command::Update => {
                    change
                        .push_to(self.database.as_ref(), codec::nulls_to_deletes)
                        .await
                }
                _ => change.push_to(self.database.as_ref(), Clone::clone).await,
            };
            if let Err(err) = result {
                tracing::warn!(path = change.doc_path(), %err, "change failed to execute");
            }
        }
        self.has_run = true;
        self.store_migration().await?;
        self.store_rollback().await?;
        Ok(())
    }

    /// Map the current batch to the migration that inverses it.
    ///
    /// Command inversion: Add becomes Delete, Delete becomes Add, Update
    /// stays Update (its rollback patch is the inverse), Set becomes Delete
    /// when the document did not exist before and Update otherwise, and
    /// Unknown propagates for the replayer to re-infer. Any change in an
    /// error state fails the whole build; no partial rollback is produced.
    pub fn build_rollback(&self) -> MigrateResult<Migration> {
        let mut units = Vec::with_capacity(self.changes.len());
        for change in &self.changes {
            if let Some(err) = change.err_state() {
                return Err(MigrateError::ErrState {
                    path: change.doc_path().to_string(),
                    source: err.clone(),
                });
            }
            let command = match change.command() {
                Command::Add => Command::Delete,
                Command::Update => Command::Update,
                Command::Delete => Command::Add,
                Command::Set => {
                    if change.before().map_or(true, |before| before.is_empty()) {
                        Command::Delete
                    } else {
                        Command::Update
                    }
                }
                Command::Unknown => Command::Unknown,
            };
            units.push(WorkUnit {
                doc_path: change.doc_path().to_string(),
                patch: change
                    .rollback()
                    .filter(|patch| !patch.as_object().is_some_and(|o| o.is_empty()))
                    .cloned(),
                command,
            });
        }
        Ok(Migration {
            database_name: self.database.name(),
            timestamp: Utc::now(),
            executed: false,
            change_units: units,
        })
    }

    async fn store_rollback(&self) -> MigrateResult<()> {
        let rollback = self.build_rollback()?;
        store::store_json(
            &self.storage_path,
            &format!("{}_rollback", self.name),
            &rollback,
        )
        .await
    }

    /// Persist the current batch as a migration file under this migrator's
    /// name. The forward file records intent, so changes in an error state
    /// are written too.
    pub async fn store_migration(&self) -> MigrateResult<()> {
        let migration = Migration {
            database_name: self.database.name(),
            timestamp: Utc::now(),
            executed: self.has_run,
            change_units: self
                .changes
                .iter()
                .map(|change| WorkUnit {
                    doc_path: change.doc_path().to_string(),
                    patch: change.unit_patch(),
                    command: change.command(),
                })
                .collect(),
        };
        store::store_json(&self.storage_path, &self.name, &migration).await
    }

    /// Replace this migrator's state with the migration file stored under
    /// its name.
    ///
    /// Each unit's patch is decoded and re-staged under the persisted
    /// command, so the ordinary solve pipeline re-derives the after-image,
    /// rollback, and diff. A unit persisted as Add loads as Set: its path
    /// already exists, and Add is only meaningful for fresh paths.
    pub async fn load_migration(&mut self) -> MigrateResult<()> {
        let migration: Migration = store::load_json(&self.storage_path, &self.name).await?;
        tracing::debug!(
            name = self.name,
            database = migration.database_name,
            units = migration.change_units.len(),
            "loaded migration"
        );
        self.has_run = migration.executed;
        self.changes.clear();
        for unit in migration.change_units {
            let patch = unit.patch.as_ref().map(codec::decode_map).unwrap_or_default();
            match unit.command {
                Command::Add | Command::Set => self.stage().set(&unit.doc_path, patch).await?,
                Command::Update => self.stage().update(&unit.doc_path, patch).await?,
                Command::Delete => self.stage().delete(&unit.doc_path).await?,
                Command::Unknown => self.stage().unknown(&unit.doc_path, patch).await?,
            }
        }
        Ok(())
    }
}

fn separator(length: usize) -> String {
    let dashes = "-".repeat(length);
    format!("\n<{dashes}>\n<{dashes}>\n\n")
}

fn longest_line(text: &str) -> usize {
    text.lines().map(|line| line.chars().count()).max().unwrap_or(0)
}
