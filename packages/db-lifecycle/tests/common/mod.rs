#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use db_lifecycle::infra::db::Connector;
use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr, MockDatabase,
    MockDatabaseConnection, MockExecResult, RuntimeErr, Statement, Transaction,
};

/// Connector whose answers are decided by a closure of `(url, call_index)`.
/// Every requested URL is recorded.
pub struct ScriptedConnector<F> {
    respond: F,
    calls: Mutex<Vec<String>>,
}

impl<F> ScriptedConnector<F>
where
    F: Fn(&str, usize) -> Result<DatabaseConnection, DbErr> + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls poisoned").len()
    }
}

#[async_trait]
impl<F> Connector for ScriptedConnector<F>
where
    F: Fn(&str, usize) -> Result<DatabaseConnection, DbErr> + Send + Sync,
{
    async fn connect(&self, url: &str) -> Result<DatabaseConnection, DbErr> {
        let index = {
            let mut calls = self.calls.lock().expect("calls poisoned");
            calls.push(url.to_string());
            calls.len() - 1
        };
        (self.respond)(url, index)
    }
}

pub fn conn_refused() -> DbErr {
    DbErr::Conn(RuntimeErr::Internal(
        "error communicating with database: Connection refused (os error 111)".into(),
    ))
}

pub fn db_absent(name: &str) -> DbErr {
    DbErr::Conn(RuntimeErr::Internal(format!(
        "error returned from database: database \"{name}\" does not exist"
    )))
}

pub fn exec_ok() -> MockExecResult {
    MockExecResult {
        last_insert_id: 0,
        rows_affected: 0,
    }
}

/// Postgres mock that accepts `execs` statements
pub fn mock_pg(execs: usize) -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results((0..execs).map(|_| exec_ok()))
        .into_connection()
}

/// Postgres mock that outlives the connections handed out for it.
///
/// Mock `DatabaseConnection`s are not `Clone`, so every handle shares one
/// underlying mock and the statement log stays readable after the code under
/// test has closed its connection.
#[derive(Clone)]
pub struct SharedMock(Arc<MockDatabaseConnection>);

impl SharedMock {
    pub fn postgres(execs: usize) -> Self {
        match mock_pg(execs) {
            DatabaseConnection::MockDatabaseConnection(inner) => Self(inner),
            _ => unreachable!("MockDatabase always yields a mock connection"),
        }
    }

    pub fn connection(&self) -> DatabaseConnection {
        DatabaseConnection::MockDatabaseConnection(Arc::clone(&self.0))
    }

    /// Drain everything executed through any handle so far
    pub fn transaction_log(&self) -> Vec<Transaction> {
        self.connection().into_transaction_log()
    }

    /// Debug rendering of the drained log, for substring checks
    pub fn statement_log(&self) -> String {
        format!("{:?}", self.transaction_log())
    }
}

/// Every user table in a sqlite database, bookkeeping table included
pub async fn sqlite_master_tables(conn: &DatabaseConnection) -> Vec<String> {
    let rows = conn
        .query_all(Statement::from_string(
            DatabaseBackend::Sqlite,
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        ))
        .await
        .expect("query sqlite_master");
    rows.iter()
        .map(|row| row.try_get::<String>("", "name").expect("name column"))
        .collect()
}
