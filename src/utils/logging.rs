//! Logging initialization
//!
//! Simple tracing setup that:
//! - Respects the RUST_LOG environment variable
//! - Falls back to a config-provided filter
//! - Defaults to "info"

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging for the host process
///
/// RUST_LOG always takes precedence. If it is unset, the filter from the
/// config file is used, and if that is also absent the level defaults to
/// "info". Output goes to stderr in human-readable format.
///
/// # Arguments
/// * `filter` - Optional log filter from config (e.g. "info", "modhost=debug")
pub fn init_logging(filter: Option<&str>) {
    let mut env_filter = EnvFilter::from_default_env();

    if std::env::var("RUST_LOG").is_err() {
        env_filter = match filter {
            Some(f) => EnvFilter::new(f),
            None => EnvFilter::new("info"),
        };
    }

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(env_filter)
        .init();
}
