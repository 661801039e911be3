//! Read the table/column layout the database currently has.

use std::collections::BTreeMap;

use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};

use crate::error::DbLifecycleError;
use crate::infra::db::teardown::BOOKKEEPING_TABLE;

/// Tables and their columns (in ordinal order) as the server reports them.
/// The migration bookkeeping table is never included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveSchema {
    tables: BTreeMap<String, Vec<String>>,
}

impl LiveSchema {
    pub fn from_tables<I, T, C>(tables: I) -> Self
    where
        I: IntoIterator<Item = (T, Vec<C>)>,
        T: Into<String>,
        C: Into<String>,
    {
        let tables = tables
            .into_iter()
            .filter_map(|(name, cols)| {
                let name: String = name.into();
                if name == BOOKKEEPING_TABLE {
                    return None;
                }
                let cols: Vec<String> = cols.into_iter().map(Into::into).collect();
                Some((name, cols))
            })
            .collect();
        Self { tables }
    }

    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

pub async fn live_schema(db: &DatabaseConnection) -> Result<LiveSchema, DbLifecycleError> {
    let backend = db.get_database_backend();
    let tables_sql = match backend {
        DatabaseBackend::Sqlite => {
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
        }
        DatabaseBackend::Postgres => {
            "SELECT table_name::text AS name FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_type = 'BASE TABLE' ORDER BY table_name"
        }
        other => {
            return Err(DbLifecycleError::config(format!(
                "schema introspection is not supported for {other:?}"
            )))
        }
    };

    let table_names = query_names(db, Statement::from_string(backend, tables_sql)).await?;

    let mut tables = Vec::with_capacity(table_names.len());
    for table in table_names {
        if table == BOOKKEEPING_TABLE {
            continue;
        }
        let stmt = match backend {
            DatabaseBackend::Sqlite => Statement::from_sql_and_values(
                backend,
                "SELECT name FROM pragma_table_info(?) ORDER BY cid",
                [table.clone().into()],
            ),
            _ => Statement::from_sql_and_values(
                backend,
                "SELECT column_name::text AS name FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = $1 ORDER BY ordinal_position",
                [table.clone().into()],
            ),
        };
        let columns = query_names(db, stmt).await?;
        tables.push((table, columns));
    }

    Ok(LiveSchema::from_tables(tables))
}

async fn query_names(
    db: &DatabaseConnection,
    stmt: Statement,
) -> Result<Vec<String>, DbLifecycleError> {
    let rows = db
        .query_all(stmt)
        .await
        .map_err(|e| DbLifecycleError::db("failed to introspect schema", e))?;
    rows.iter()
        .map(|row| {
            row.try_get::<String>("", "name")
                .map_err(|e| DbLifecycleError::db("failed to read introspection row", e))
        })
        .collect()
}
