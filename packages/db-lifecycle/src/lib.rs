//! Database lifecycle orchestration for deployments.
//! Used by the `dbctl` CLI and its tests.

pub mod config;
pub mod error;
pub mod infra;

pub use config::db;
pub use error::DbLifecycleError;
pub use infra::db::core::{orchestrate, orchestrate_internal, LifecycleCommand};
