//! Diagnostic logging for the binary.
//!
//! The filter comes from `TIMEKEEPER_LOG`, then `RUST_LOG`, then the
//! configured level for this crate. Output goes to stderr so that tables on
//! stdout stay clean.

use std::io;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub const LOG_ENV_VAR: &str = "TIMEKEEPER_LOG";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub show_target: bool,
    pub show_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            show_target: false,
            show_timestamps: false,
        }
    }
}

impl LoggingConfig {
    pub fn from_args(verbose: bool) -> Self {
        if verbose {
            Self {
                level: Level::DEBUG,
                show_target: true,
                show_timestamps: true,
            }
        } else {
            Self::default()
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(LOG_ENV_VAR)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new(format!("timekeeper={}", self.level)))
    }
}

/// Installs the global subscriber. Calling it twice is harmless; the second
/// call leaves the first subscriber in place.
pub fn init_logging(config: LoggingConfig) {
    let registry = Registry::default().with(config.filter());
    let layer = fmt::layer()
        .with_target(config.show_target)
        .with_level(true)
        .with_writer(io::stderr);

    let _ = if config.show_timestamps {
        registry.with(layer).try_init()
    } else {
        registry.with(layer.without_time()).try_init()
    };
}
