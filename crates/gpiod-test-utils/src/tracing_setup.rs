//! Tracing initialisation helpers for tests.
//!
//! Call [`init_test_tracing`] at the top of any test that wants daemon log
//! output captured by the test harness. Tests using `#[test_log::test]` get
//! the same effect without calling it.

use tracing_subscriber::EnvFilter;

/// Initialise a tracing subscriber that writes to the test-harness writer
/// and respects `RUST_LOG` (default `gpiod_core=debug`).
///
/// Safe to call multiple times; later calls are ignored.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gpiod_core=debug")),
        )
        .with_test_writer()
        .try_init();
}
