//! User-facing staging surface for appending changes to a migrator.

use crate::change::{Change, Command};
use crate::error::MigrateResult;
use crate::migrator::Migrator;
use ebb_db::DocMap;

/// Converts operator intents (add/set/update/delete on a path) into staged
/// [`Change`]s, fetching each document's current state from the database.
///
/// Obtained from [`Migrator::stage`]; every call appends one change.
pub struct Stager<'m> {
    migrator: &'m mut Migrator,
}

impl<'m> Stager<'m> {
    pub(crate) fn new(migrator: &'m mut Migrator) -> Self {
        Self { migrator }
    }

    /// Stage a merge-update of the document at `doc_path`.
    pub async fn update(&mut self, doc_path: &str, data: DocMap) -> MigrateResult<()> {
        self.stage_with_before(doc_path, Some(data), Command::Update)
            .await
    }

    /// Stage an overwrite of the document at `doc_path`.
    pub async fn set(&mut self, doc_path: &str, data: DocMap) -> MigrateResult<()> {
        self.stage_with_before(doc_path, Some(data), Command::Set)
            .await
    }

    /// Stage a new document inside `col_path`, at a freshly generated path.
    pub async fn add(&mut self, col_path: &str, data: DocMap) -> MigrateResult<()> {
        let doc_path = self.migrator.database().gen_doc_path(col_path).await?;
        self.migrator.append(Change::new(
            doc_path,
            Some(DocMap::new()),
            Some(data),
            Command::Add,
        ));
        Ok(())
    }

    /// Stage a deletion of the document at `doc_path`.
    pub async fn delete(&mut self, doc_path: &str) -> MigrateResult<()> {
        self.stage_with_before(doc_path, Some(DocMap::new()), Command::Delete)
            .await
    }

    /// Stage a change whose command is unknown and will be inferred while
    /// solving. Used when replaying migrations persisted without a command.
    pub async fn unknown(&mut self, doc_path: &str, data: DocMap) -> MigrateResult<()> {
        self.stage_with_before(doc_path, Some(data), Command::Unknown)
            .await
    }

    async fn stage_with_before(
        &mut self,
        doc_path: &str,
        patch: Option<DocMap>,
        command: Command,
    ) -> MigrateResult<()> {
        let database = self.migrator.database();
        let before = database.get_doc_data(doc_path).await?;
        self.migrator
            .append(Change::new(doc_path, Some(before), patch, command));
        Ok(())
    }
}
