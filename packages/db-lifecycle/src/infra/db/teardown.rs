use migration::SchemaModel;
use sea_orm::sea_query::{Alias, Table};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use tracing::{debug, info};

use crate::error::DbLifecycleError;

/// Migration bookkeeping table. The name must stay stable across releases or
/// every deployed database loses track of its applied revisions.
pub const BOOKKEEPING_TABLE: &str = "seaql_migrations";

/// Drop every model table, then the bookkeeping table. Safe to repeat.
pub async fn drop_schema<S>(db: &DatabaseConnection, model: &S) -> Result<(), DbLifecycleError>
where
    S: SchemaModel + ?Sized,
{
    let backend = db.get_database_backend();
    let tables = model.tables();

    // reverse creation order so dependents go first
    for table in tables.iter().rev() {
        let stmt = Table::drop()
            .table(Alias::new(table.name.as_str()))
            .if_exists()
            .to_owned();
        db.execute(backend.build(&stmt))
            .await
            .map_err(|e| DbLifecycleError::db(format!("failed to drop table {}", table.name), e))?;
        debug!(table = %table.name, "table dropped");
    }

    // A missing bookkeeping table is not an error.
    if let Err(e) = db
        .execute_unprepared(&format!("DROP TABLE IF EXISTS {BOOKKEEPING_TABLE}"))
        .await
    {
        debug!(error = %e, table = BOOKKEEPING_TABLE, "bookkeeping table drop skipped");
    }

    info!(tables = tables.len(), "dropped schema tables");
    Ok(())
}
