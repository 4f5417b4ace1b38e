//! Tracing setup and guest log forwarding.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialise the global tracing subscriber.
///
/// * `default_filter` -- `RUST_LOG` value used when the env-var is not set.
/// * `log_json` -- emit structured JSON lines instead of the human-readable
///   format.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
    );
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Forward an `app_log` call from a guest at the level it asked for.
///
/// Unknown level names are logged at info.
pub fn guest_log(level: &str, message: &str) {
    match level.to_ascii_lowercase().as_str() {
        "error" => tracing::error!(target: "guest", "{message}"),
        "warn" | "warning" => tracing::warn!(target: "guest", "{message}"),
        "debug" => tracing::debug!(target: "guest", "{message}"),
        "trace" => tracing::trace!(target: "guest", "{message}"),
        _ => tracing::info!(target: "guest", level, "{message}"),
    }
}
