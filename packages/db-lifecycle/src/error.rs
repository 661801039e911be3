use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbLifecycleError {
    /// Missing or malformed settings, including unparseable URLs
    #[error("Configuration error: {message}")]
    Config { message: String },
    /// `target` is already sanitized
    #[error("Don't know how to create a database of type {target}")]
    UnknownBackend { target: String },
    #[error("Could not connect to database {target} after {attempts} attempt(s)")]
    RetryExhausted { target: String, attempts: u32 },
    #[error("{context}: {source}")]
    Db {
        context: String,
        #[source]
        source: DbErr,
    },
    /// Revision generation refused or the script directory is unusable
    #[error("Revision script error: {message}")]
    Script { message: String },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl DbLifecycleError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn db(context: impl Into<String>, source: DbErr) -> Self {
        Self::Db {
            context: context.into(),
            source,
        }
    }

    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
