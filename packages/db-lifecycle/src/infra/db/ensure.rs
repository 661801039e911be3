//! `ensure`: create the database when the backend needs it, then the model
//! tables.

use migration::SchemaModel;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use tracing::{debug, error, info};

use crate::error::DbLifecycleError;
use crate::infra::db::backend::{BackendKind, ConnectFailure};
use crate::infra::db::core::{close_quietly, connect, Connector};
use crate::infra::db::descriptor::ConnectionDescriptor;

/// Make sure the target database and every model table exist.
///
/// Safe to run on every deploy: table creation uses `IF NOT EXISTS`.
pub async fn ensure_database<C, S>(
    connector: &C,
    descriptor: &ConnectionDescriptor,
    model: &S,
) -> Result<(), DbLifecycleError>
where
    C: Connector + ?Sized,
    S: SchemaModel + ?Sized,
{
    match BackendKind::classify(descriptor) {
        BackendKind::Sqlite => ensure_sqlite(connector, descriptor, model).await,
        BackendKind::Postgres => ensure_postgres(connector, descriptor, model).await,
        BackendKind::Unknown => {
            let target = descriptor.redacted();
            error!(
                db_target = %target,
                "Don't know how to create a database of this type"
            );
            Err(DbLifecycleError::UnknownBackend { target })
        }
    }
}

async fn ensure_sqlite<C, S>(
    connector: &C,
    descriptor: &ConnectionDescriptor,
    model: &S,
) -> Result<(), DbLifecycleError>
where
    C: Connector + ?Sized,
    S: SchemaModel + ?Sized,
{
    if let Some(path) = descriptor.sqlite_path() {
        if path.exists() {
            // informational only; missing tables are still created below
            info!("{} exists. Not doing anything", path.display());
        }
    }

    let conn = connect(connector, &descriptor.connect_url(), &descriptor.redacted()).await?;
    let result = create_tables(&conn, model).await;
    close_quietly(conn, "sqlite ensure").await;
    result?;

    info!("successfully created the tables");
    Ok(())
}

async fn ensure_postgres<C, S>(
    connector: &C,
    descriptor: &ConnectionDescriptor,
    model: &S,
) -> Result<(), DbLifecycleError>
where
    C: Connector + ?Sized,
    S: SchemaModel + ?Sized,
{
    match connector.connect(&descriptor.connect_url()).await {
        Ok(conn) => {
            close_quietly(conn, "postgres probe").await;
            info!("Database exists. Not doing anything.");
            Ok(())
        }
        Err(e) if ConnectFailure::classify(&e) == ConnectFailure::DatabaseAbsent => {
            debug!(error = %e, "target database missing; creating it");
            create_postgres_database(connector, descriptor).await?;

            let conn =
                connect(connector, &descriptor.connect_url(), &descriptor.redacted()).await?;
            let result = create_tables(&conn, model).await;
            close_quietly(conn, "postgres ensure").await;
            result?;

            info!("successfully created the tables");
            Ok(())
        }
        Err(e) => Err(DbLifecycleError::db(
            format!("failed to connect to {}", descriptor.redacted()),
            e,
        )),
    }
}

async fn create_postgres_database<C>(
    connector: &C,
    descriptor: &ConnectionDescriptor,
) -> Result<(), DbLifecycleError>
where
    C: Connector + ?Sized,
{
    let admin_url = descriptor.admin_url().ok_or_else(|| {
        DbLifecycleError::config(format!(
            "no administrative database for {}",
            descriptor.redacted()
        ))
    })?;
    let db_name = descriptor.database_name();

    let admin = connect(connector, &admin_url, &descriptor.server_display()).await?;
    // Executed straight on the pooled connection, never inside begin():
    // CREATE DATABASE cannot run in a transaction block.
    let result = admin
        .execute_unprepared(&create_database_sql(db_name))
        .await
        .map_err(|e| DbLifecycleError::db(format!("failed to create database {db_name}"), e));
    close_quietly(admin, "postgres admin").await;
    result?;

    info!(
        "Database {} successfully created on {}.",
        db_name,
        descriptor.server_display()
    );
    Ok(())
}

/// Create every model table that is not there yet, in model order
pub async fn create_tables<S>(conn: &DatabaseConnection, model: &S) -> Result<(), DbLifecycleError>
where
    S: SchemaModel + ?Sized,
{
    let backend = conn.get_database_backend();
    for table in model.tables() {
        let mut stmt = table.create.clone();
        stmt.if_not_exists();
        conn.execute(backend.build(&stmt))
            .await
            .map_err(|e| DbLifecycleError::db(format!("failed to create table {}", table.name), e))?;
        debug!(table = %table.name, "table ensured");
    }
    Ok(())
}

/// `CREATE DATABASE` for Postgres, UTF-8 encoded, name quoted when needed
pub fn create_database_sql(db_name: &str) -> String {
    format!(
        "CREATE DATABASE {} WITH ENCODING = 'UTF8'",
        quote_ident(db_name)
    )
}

/// Plain identifiers pass through bare; anything else is double-quoted.
fn quote_ident(name: &str) -> String {
    let mut chars = name.chars();
    let plain = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}
