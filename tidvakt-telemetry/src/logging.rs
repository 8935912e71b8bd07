//! ## tidvakt-telemetry::logging
//! **Process-wide `tracing` subscriber**
//!
//! `RUST_LOG` wins over the configured filter directive so an operator can
//! raise verbosity without touching the config file.

use thiserror::Error;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{directive}': {source}")]
    Filter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("a global subscriber is already installed")]
    AlreadyInitialised,
}

/// Builds the filter from `RUST_LOG`, falling back to `directive`.
pub fn env_filter(directive: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(directive).map_err(|source| LoggingError::Filter {
            directive: directive.to_owned(),
            source,
        }),
    }
}

/// Installs the global fmt subscriber.
pub fn init_logging(directive: &str, thread_names: bool) -> Result<(), LoggingError> {
    let filter = env_filter(directive)?;
    let active = filter.to_string();
    fmt()
        .with_env_filter(filter)
        .with_thread_names(thread_names)
        .with_target(false)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialised)?;
    debug!(filter = %active, "logging initialised");
    Ok(())
}
