//! Test support utilities
//!
//! Unified logging initialization and scratch-database fixtures shared by the
//! workspace's integration tests.

pub mod logging;
pub mod sqlite;

/// Generate a unique, lowercase database name with the given prefix
///
/// ```
/// use test_support::unique_db_name;
///
/// let a = unique_db_name("app");
/// let b = unique_db_name("app");
/// assert_ne!(a, b);
/// assert!(a.starts_with("app_"));
/// ```
pub fn unique_db_name(prefix: &str) -> String {
    format!("{}_{}", prefix, ulid::Ulid::new().to_string().to_lowercase())
}
