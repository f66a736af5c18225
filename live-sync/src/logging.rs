//! Logging setup.
//!
//! `RUST_LOG` takes precedence over the configured levels:
//!
//! ```bash
//! RUST_LOG=liveindex_live_sync=debug,liveindex_directory_watcher=trace liveindex
//! ```

use std::sync::Once;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Build the filter directive string for a configuration.
pub fn filter_directives(config: &LoggingConfig) -> String {
    let mut directives = config.default.clone();
    for (module, level) in &config.modules {
        directives.push_str(&format!(",{module}={level}"));
    }
    directives
}

/// Install the global subscriber. Only the first call has any effect.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true)
            .with_filter(filter);

        // Another subscriber (a test harness, an embedding binary) wins.
        let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
    });
}

/// Install the global subscriber with default levels.
pub fn init() {
    init_with_config(&LoggingConfig::default());
}
