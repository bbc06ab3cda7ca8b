#![allow(dead_code)] // Shared across test binaries; each uses a subset.

use std::sync::Once;

static INIT: Once = Once::new();

/// Opt-in log capture: `RUST_LOG=sim=trace cargo test -p rx-lib` shows the
/// full event dispatch while a scenario runs.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
