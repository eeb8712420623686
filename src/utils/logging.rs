//! Tracing/logging initialization.

use crate::config::models::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber from the logging config.
///
/// Respects `RUST_LOG` if set; otherwise falls back to the configured
/// level. JSON output is used when `logging.json` is true, which is what
/// operators want once the gateway runs behind a log aggregator rather
/// than a terminal.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    if config.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
