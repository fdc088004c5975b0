//! Tracing subscriber setup

use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Build the subscriber described by `config` without installing it
///
/// `RUST_LOG` takes precedence over `logging.level`.
pub fn build_subscriber(config: &LoggingConfig) -> Box<dyn Subscriber + Send + Sync> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("feedline={}", config.level).into());

    if config.format == "json" {
        Box::new(
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json()),
        )
    } else {
        Box::new(
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().pretty()),
        )
    }
}

/// Install the global tracing subscriber
///
/// A subscriber that is already installed is left in place.
pub fn init_tracing(config: &LoggingConfig) {
    if build_subscriber(config).try_init().is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logging(level: &str, format: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            format: format.to_string(),
        }
    }

    #[test]
    fn configured_level_filters_crate_events() {
        // RUST_LOG overrides the configured level
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }

        for format in ["json", "pretty"] {
            let dispatch = tracing::Dispatch::new(build_subscriber(&logging("warn", format)));

            tracing::dispatcher::with_default(&dispatch, || {
                assert!(tracing::enabled!(target: "feedline", tracing::Level::WARN));
                assert!(!tracing::enabled!(target: "feedline", tracing::Level::INFO));
            });
        }
    }
}
