//! Process-wide log setup for the binaries.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs a `fmt` subscriber on stderr, filtered by `RUST_LOG`
/// (default `info`).
///
/// Stdout is left to program output such as the monitor's status line.
/// Calling this twice is harmless; the second call does nothing.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .try_init();
    if result.is_err() {
        tracing::debug!("tracing already initialised");
    }
}
