use sea_orm::DbErr;

use crate::infra::db::descriptor::ConnectionDescriptor;

/// Database engine family a descriptor targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Sqlite,
    Postgres,
    /// No creation strategy exists; callers must treat this as fatal
    Unknown,
}

impl BackendKind {
    /// Classify by token presence anywhere in the descriptor, not by strict
    /// scheme parsing. Postgres-family tokens win over `sqlite`.
    pub fn classify(descriptor: &ConnectionDescriptor) -> Self {
        Self::from_token(descriptor.raw())
    }

    pub fn from_token(raw: &str) -> Self {
        if raw.contains("postgres") || raw.contains("psycopg2") {
            BackendKind::Postgres
        } else if raw.contains("sqlite") {
            BackendKind::Sqlite
        } else {
            BackendKind::Unknown
        }
    }
}

/// How a failed connection attempt should be treated by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    /// Server answered, but the named database has not been created yet
    DatabaseAbsent,
    /// Server not reachable (yet)
    Transient,
    /// Anything the driver did not report as a connection problem
    Unexpected,
}

impl ConnectFailure {
    /// The driver gives no structured code for a missing database, so this
    /// keys on the server's message text.
    pub fn classify(err: &DbErr) -> Self {
        if err.to_string().contains("does not exist") {
            return ConnectFailure::DatabaseAbsent;
        }
        match err {
            DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => ConnectFailure::Transient,
            _ => ConnectFailure::Unexpected,
        }
    }
}
