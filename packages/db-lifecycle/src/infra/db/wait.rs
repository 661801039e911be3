use tracing::{error, info, warn};

use crate::config::db::RetryPolicy;
use crate::error::DbLifecycleError;
use crate::infra::db::backend::ConnectFailure;
use crate::infra::db::core::{close_quietly, Connector};
use crate::infra::db::descriptor::ConnectionDescriptor;

/// Outcome of a successful readiness wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// A connection to the named database was opened
    Connected { attempts: u32 },
    /// The server answered but the named database does not exist yet
    DatabaseAbsent { attempts: u32 },
}

impl Readiness {
    pub fn attempts(&self) -> u32 {
        match self {
            Readiness::Connected { attempts } | Readiness::DatabaseAbsent { attempts } => *attempts,
        }
    }
}

/// Block until the database server is reachable or the policy is exhausted.
///
/// Sleeps `policy.interval()` before every attempt but the first. A
/// "database does not exist" answer ends the loop early: the server is up and
/// only provisioning remains.
pub async fn wait_for_database<C>(
    connector: &C,
    descriptor: &ConnectionDescriptor,
    policy: &RetryPolicy,
) -> Result<Readiness, DbLifecycleError>
where
    C: Connector + ?Sized,
{
    let url = descriptor.connect_url();
    let max_attempts = policy.max_attempts();
    let interval_ms = policy.interval().as_millis();

    for attempt in 1..=max_attempts {
        info!(
            "Testing database connection... (attempt {}/{})",
            attempt, max_attempts
        );
        if attempt > 1 {
            tokio::time::sleep(policy.interval()).await;
        }

        match connector.connect(&url).await {
            Ok(conn) => {
                close_quietly(conn, "readiness probe").await;
                info!(
                    "connection_retry=success attempts={} interval_ms={}",
                    attempt, interval_ms
                );
                info!("Database connection successful");
                return Ok(Readiness::Connected { attempts: attempt });
            }
            Err(e) => match ConnectFailure::classify(&e) {
                ConnectFailure::DatabaseAbsent => {
                    info!(
                        database = descriptor.database_name(),
                        attempts = attempt,
                        "Database server reachable; database does not exist yet"
                    );
                    return Ok(Readiness::DatabaseAbsent { attempts: attempt });
                }
                ConnectFailure::Transient => {
                    warn!(
                        "connection_retry=failed attempt={} max_attempts={} interval_ms={} error={} (db still not available?)",
                        attempt, max_attempts, interval_ms, e
                    );
                }
                ConnectFailure::Unexpected => {
                    error!(
                        attempt,
                        max_attempts,
                        error = ?e,
                        "Could not connect to database ({}). Going to retry...",
                        e
                    );
                }
            },
        }
    }

    let target = descriptor.redacted();
    error!(
        db_target = %target,
        attempts = max_attempts,
        "Could not connect to database"
    );
    Err(DbLifecycleError::RetryExhausted {
        target,
        attempts: max_attempts,
    })
}
