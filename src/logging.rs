//! Diagnostics for log0 itself.
//!
//! Stream entries are product output: they go to stream files or the primary
//! console and are unaffected by `RUST_LOG`. This module only wires up the
//! `tracing` events the library emits about its own work (stream creation,
//! rotation, recovered errors), written to stderr.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber for the viewer binary.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
///
/// # Example
/// ```bash
/// RUST_LOG=log0=debug log0 sampler
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // a subscriber installed by an embedding application wins
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
