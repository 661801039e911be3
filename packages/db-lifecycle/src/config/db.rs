use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::DbLifecycleError;

/// Default number of connection attempts made by `db wait`
pub const DEFAULT_WAIT_MAX_ATTEMPTS: u32 = 60;
/// Default pause between connection attempts
pub const DEFAULT_WAIT_INTERVAL_MS: u64 = 1000;
/// Default per-attempt connection acquire timeout
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2000;
/// Default location of the migration sources that `db revision` writes into
pub const DEFAULT_MIGRATION_SCRIPT_DIR: &str = "packages/migration/src";

/// Bounded retry schedule for the readiness loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Result<Self, DbLifecycleError> {
        if max_attempts == 0 {
            return Err(DbLifecycleError::config(
                "retry policy requires at least one attempt",
            ));
        }
        Ok(Self {
            max_attempts,
            interval,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_WAIT_MAX_ATTEMPTS,
            interval: Duration::from_millis(DEFAULT_WAIT_INTERVAL_MS),
        }
    }
}

/// Everything the lifecycle commands read from the environment
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub database_url: String,
    pub wait: RetryPolicy,
    pub connect_timeout: Duration,
    pub script_dir: PathBuf,
}

impl LifecycleSettings {
    /// Builds settings from environment variables. An explicit URL (e.g. from
    /// a CLI flag) takes precedence over `DATABASE_URL`, which is otherwise
    /// required.
    pub fn resolve(database_url: Option<String>) -> Result<Self, DbLifecycleError> {
        let database_url = match database_url {
            Some(url) => url,
            None => must_var("DATABASE_URL")?,
        };

        let max_attempts = parsed_var("DB_WAIT_MAX_ATTEMPTS", DEFAULT_WAIT_MAX_ATTEMPTS)?;
        let interval_ms = parsed_var("DB_WAIT_INTERVAL_MS", DEFAULT_WAIT_INTERVAL_MS)?;
        let connect_timeout_ms = parsed_var("DB_CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT_MS)?;
        let script_dir = env::var("MIGRATION_SCRIPT_DIR")
            .unwrap_or_else(|_| DEFAULT_MIGRATION_SCRIPT_DIR.to_string());

        Ok(Self {
            database_url,
            wait: RetryPolicy::new(max_attempts, Duration::from_millis(interval_ms))?,
            connect_timeout: Duration::from_millis(connect_timeout_ms),
            script_dir: PathBuf::from(script_dir),
        })
    }
}

/// Get required environment variable or return error
fn must_var(name: &str) -> Result<String, DbLifecycleError> {
    env::var(name).map_err(|_| {
        DbLifecycleError::config(format!("Required environment variable '{name}' is not set"))
    })
}

/// Parse an optional environment variable, falling back to `default` when unset
fn parsed_var<T: FromStr>(name: &str, default: T) -> Result<T, DbLifecycleError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| {
            DbLifecycleError::config(format!(
                "Environment variable '{name}' has an invalid value: '{raw}'"
            ))
        }),
        Err(_) => Ok(default),
    }
}
