//! Logging initialization and configuration.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor a configured level is present.
pub const DEFAULT_FILTER: &str = "instance_manager=info";

/// Initialize the logging system.
///
/// Uses the `RUST_LOG` environment variable for filtering. If not set,
/// defaults to `instance_manager=info`.
///
/// # Panics
///
/// Panics if called more than once, or if another tracing subscriber
/// has already been set.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();
}

/// Try to initialize the logging system.
///
/// Returns `Ok(())` if successful, or `Err` if logging has already been
/// initialized.
pub fn try_init() -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    try_init_with(filter)
}

/// Initialize logging with an explicit level or filter directive.
///
/// A bare level such as `debug` is scoped to this crate; anything containing
/// `=` or `,` is used as a full filter directive.
pub fn init_with_level(level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    try_init_with(EnvFilter::new(filter_directive(level)))
}

fn try_init_with(filter: EnvFilter) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .try_init()
}

fn filter_directive(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("instance_manager={}", level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_init_idempotent() {
        // First call may or may not succeed depending on test order
        let _ = try_init();
        // Either way, a second call must not panic
        let _ = try_init();
    }

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive("debug"), "instance_manager=debug");
        assert_eq!(filter_directive("instance_manager=trace"), "instance_manager=trace");
        assert_eq!(filter_directive("info,tokio=warn"), "info,tokio=warn");
    }

    #[test]
    fn test_logging_works() {
        let _ = init_with_level("debug");

        tracing::info!(session = "inst-00000001", "test info message");
        tracing::debug!("test debug message");
        tracing::warn!("test warn message");
    }
}
