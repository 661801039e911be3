//! Unified test logging initialization
//!
//! One subscriber for the whole test binary, shared by unit and integration
//! tests in every workspace crate.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Initialize structured logging for tests.
///
/// Idempotent and race-safe: every test may call it first thing. The filter
/// is taken from, in order of precedence:
///
/// 1. `TEST_LOG` (e.g. `TEST_LOG=db_lifecycle=debug`)
/// 2. `RUST_LOG`
/// 3. `"warn"`
///
/// Output goes through `with_test_writer()` so the harness captures it per
/// test, and timestamps are left out.
pub fn init() {
    INITIALIZED.get_or_init(|| {
        let filter = std::env::var("TEST_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .map(EnvFilter::new)
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // Critical for cargo/nextest capture
            .without_time()
            .try_init()
            .ok(); // Never panic if something else already initialized
    });
}
