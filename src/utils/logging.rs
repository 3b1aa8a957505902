use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Initialize tracing/logging for an application embedding the queue.
///
/// `RUST_LOG` takes precedence over `settings.level`. Unknown levels fall
/// back to `info`. Returns `false` when a global subscriber was already
/// installed, so tests and libraries can call this repeatedly.
pub fn init(settings: &LoggingSettings) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(&settings.level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Map a configured level name onto a filter directive.
pub(crate) fn level_directive(level: &str) -> &'static str {
    match level.to_lowercase().as_str() {
        "error" => "error",
        "warn" | "warning" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        "off" => "off",
        _ => "info",
    }
}
