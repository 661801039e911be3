//! Revision chain handling on top of `sea-orm-migration`.
//!
//! The compiled migrator is the source of truth for history; the bookkeeping
//! table only says how far a given database has got. Every operation runs
//! inside a [`MigrationContext`] that is released on all exit paths.

use std::future::Future;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use migration::{MigrationName, MigratorTrait, SchemaModel};
use sea_orm::{DatabaseConnection, DbErr};
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::error::DbLifecycleError;
use crate::infra::db::autogen::{revision_id, SchemaDiff, ScriptDirectory};
use crate::infra::db::core::{connect, Connector};
use crate::infra::db::descriptor::ConnectionDescriptor;
use crate::infra::db::introspect::live_schema;

/// One step of the linear migration history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRevision {
    pub id: String,
    pub parent_id: Option<String>,
    /// Source file, for revisions generated during this run
    pub script: Option<PathBuf>,
}

/// Database handle plus live schema model, held for the duration of one
/// migration operation.
pub struct MigrationContext {
    db: DatabaseConnection,
    model: Arc<dyn SchemaModel>,
}

impl MigrationContext {
    pub async fn acquire<C>(
        connector: &C,
        descriptor: &ConnectionDescriptor,
        model: Arc<dyn SchemaModel>,
    ) -> Result<Self, DbLifecycleError>
    where
        C: Connector + ?Sized,
    {
        let db = connect(connector, &descriptor.connect_url(), &descriptor.redacted()).await?;
        Ok(Self::from_parts(db, model))
    }

    /// Wrap an already-open connection (tests, embedding callers)
    pub fn from_parts(db: DatabaseConnection, model: Arc<dyn SchemaModel>) -> Self {
        Self { db, model }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn model(&self) -> &dyn SchemaModel {
        self.model.as_ref()
    }

    /// Close the underlying connection.
    pub async fn release(self) -> Result<(), DbLifecycleError> {
        self.db
            .close()
            .await
            .map_err(|e| DbLifecycleError::db("failed to release migration context", e))
    }
}

pub type ContextFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DbLifecycleError>> + Send + 'a>>;

/// Run `op` inside a freshly acquired [`MigrationContext`], releasing it on
/// every exit path. A failed release is logged and never masks `op`'s result.
pub async fn with_migration_context<C, T, F>(
    connector: &C,
    descriptor: &ConnectionDescriptor,
    model: Arc<dyn SchemaModel>,
    op: F,
) -> Result<T, DbLifecycleError>
where
    C: Connector + ?Sized,
    F: for<'a> FnOnce(&'a MigrationContext) -> ContextFuture<'a, T>,
{
    let ctx = MigrationContext::acquire(connector, descriptor, model).await?;
    let result = op(&ctx).await;

    match result {
        Ok(value) => {
            if let Err(release_err) = ctx.release().await {
                warn!(error = %release_err, "Failed to release migration context");
            }
            Ok(value)
        }
        Err(op_err) => {
            if let Err(release_err) = ctx.release().await {
                warn!(error = %release_err, "Failed to release migration context after error");
            }
            Err(op_err)
        }
    }
}

/// Drives a migrator's revision chain: upgrade to head, autogenerate the next
/// revision.
pub struct MigrationRunner<M> {
    _migrator: PhantomData<fn() -> M>,
}

impl<M> Default for MigrationRunner<M>
where
    M: MigratorTrait,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<M> MigrationRunner<M>
where
    M: MigratorTrait,
{
    pub fn new() -> Self {
        Self {
            _migrator: PhantomData,
        }
    }

    /// The compiled chain, base first. Parent links follow declaration order.
    pub fn history(&self) -> Vec<MigrationRevision> {
        let mut parent: Option<String> = None;
        M::migrations()
            .iter()
            .map(|m| {
                let id = m.name().to_string();
                MigrationRevision {
                    id: id.clone(),
                    parent_id: parent.replace(id),
                    script: None,
                }
            })
            .collect()
    }

    pub fn head(&self) -> Option<MigrationRevision> {
        self.history().pop()
    }

    /// Revision recorded in the bookkeeping table, `None` before the first upgrade
    pub async fn current(&self, ctx: &MigrationContext) -> Result<Option<String>, DbLifecycleError> {
        match M::get_applied_migrations(ctx.db()).await {
            Ok(applied) => Ok(applied.last().map(|m| m.name().to_string())),
            Err(DbErr::Exec(_)) => Ok(None), // bookkeeping table doesn't exist yet
            Err(e) => Err(DbLifecycleError::db("failed to read applied migrations", e)),
        }
    }

    /// Revisions between the recorded one and head, parent-to-child
    pub async fn pending(
        &self,
        ctx: &MigrationContext,
    ) -> Result<Vec<MigrationRevision>, DbLifecycleError> {
        let history = self.history();
        let Some(current) = self.current(ctx).await? else {
            return Ok(history);
        };
        match history.iter().position(|rev| rev.id == current) {
            Some(idx) => Ok(history[idx + 1..].to_vec()),
            None => Err(DbLifecycleError::config(format!(
                "database is at revision {current}, which is not part of the migration history"
            ))),
        }
    }

    /// Apply every pending revision. Returns how many were applied.
    pub async fn upgrade(&self, ctx: &MigrationContext) -> Result<usize, DbLifecycleError> {
        let defined = self.history().len();
        let pending = self.pending(ctx).await?;

        info!(
            "▶ BEFORE: runner has {} migration(s) defined, {} applied",
            defined,
            defined - pending.len()
        );

        if pending.is_empty() {
            info!("migrate=skipped up_to_date=true");
            return Ok(0);
        }

        for rev in &pending {
            info!(
                revision = %rev.id,
                parent = %rev.parent_id.as_deref().unwrap_or("<base>"),
                "applying revision"
            );
        }

        M::up(ctx.db(), None).await.map_err(|e| {
            tracing::error!("❌ upgrade failed: {e}");
            DbLifecycleError::db("migration execution failed", e)
        })?;

        let applied = M::get_applied_migrations(ctx.db())
            .await
            .map_err(|e| DbLifecycleError::db("failed to read applied migrations after upgrade", e))?
            .len();
        if applied != defined {
            return Err(DbLifecycleError::config(format!(
                "Migration verification failed: expected {defined} migrations, but {applied} were applied"
            )));
        }

        info!(
            "▶ AFTER: runner has {} migration(s) defined, {} applied",
            defined, applied
        );
        info!("✅ upgrade OK, {} revision(s) applied", pending.len());
        Ok(pending.len())
    }

    /// Bring the database to head, then record the model/schema difference as
    /// a new revision on top of it.
    pub async fn revision(
        &self,
        ctx: &MigrationContext,
        message: &str,
        script_dir: &Path,
    ) -> Result<MigrationRevision, DbLifecycleError> {
        self.revision_at(ctx, message, script_dir, OffsetDateTime::now_utc())
            .await
    }

    /// [`MigrationRunner::revision`] with a fixed clock.
    ///
    /// Refuses when the script directory has a registered revision newer than
    /// the compiled head: the new script would share a parent with it and fork
    /// the chain. Rebuild, upgrade and try again.
    pub async fn revision_at(
        &self,
        ctx: &MigrationContext,
        message: &str,
        script_dir: &Path,
        now: OffsetDateTime,
    ) -> Result<MigrationRevision, DbLifecycleError> {
        // never diff against a stale base
        self.upgrade(ctx).await?;

        let scripts = ScriptDirectory::new(script_dir);
        let parent = self.head();
        let head_id = parent.as_ref().map(|rev| rev.id.as_str());

        // the new revision's parent must be the latest registered one too
        let registered = scripts.registered_revisions()?;
        let latest = registered.last().map(String::as_str);
        if latest != head_id {
            let head = head_id.unwrap_or("<base>");
            let reason = if registered.iter().any(|id| Some(id.as_str()) == head_id) {
                format!(
                    "target database is not up to date: {} in {} is not applied (head is {head}); rebuild and upgrade first",
                    latest.unwrap_or("<none>"),
                    scripts.path().display(),
                )
            } else {
                format!(
                    "{} does not register head revision {head}",
                    scripts.path().display()
                )
            };
            return Err(DbLifecycleError::script(reason));
        }

        let id = revision_id(now, message)?;
        if let Some(parent) = &parent {
            if id <= parent.id {
                return Err(DbLifecycleError::script(format!(
                    "new revision {id} would not sort after head {}",
                    parent.id
                )));
            }
        }

        let live = live_schema(ctx.db()).await?;
        let diff = SchemaDiff::between(&live, ctx.model());
        if diff.is_empty() {
            info!("No schema changes detected; writing an empty revision");
        } else {
            info!(
                create_tables = diff.create_tables.len(),
                drop_tables = diff.drop_tables.len(),
                add_columns = diff.add_columns.len(),
                drop_columns = diff.drop_columns.len(),
                "schema changes detected"
            );
        }

        let parent_id = parent.map(|p| p.id);
        let script = scripts.write_revision(
            &id,
            parent_id.as_deref(),
            message,
            &diff,
        )?;

        info!(
            revision = %id,
            parent = %parent_id.as_deref().unwrap_or("<base>"),
            script = %script.display(),
            "✅ revision generated"
        );

        Ok(MigrationRevision {
            id,
            parent_id,
            script: Some(script),
        })
    }
}
