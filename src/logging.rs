//! Logging setup shared by the binaries

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber
///
/// `RUST_LOG` takes precedence over `default_directive`,
/// e.g. `RUST_LOG=debug` or `RUST_LOG=group_chat_server=trace`.
pub fn init_tracing(default_directive: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .init();
}
