pub mod autogen;
pub mod backend;
pub mod core;
pub mod descriptor;
pub mod ensure;
pub mod introspect;
pub mod migrate;
pub mod teardown;
pub mod wait;

pub use autogen::{SchemaDiff, ScriptDirectory};
pub use backend::{BackendKind, ConnectFailure};
pub use self::core::{
    orchestrate, orchestrate_internal, sanitize_db_url, Connector, LifecycleCommand,
    LifecycleOutcome, SeaConnector,
};
pub use descriptor::ConnectionDescriptor;
pub use ensure::ensure_database;
pub use migrate::{with_migration_context, MigrationContext, MigrationRevision, MigrationRunner};
pub use teardown::{drop_schema, BOOKKEEPING_TABLE};
pub use wait::{wait_for_database, Readiness};
