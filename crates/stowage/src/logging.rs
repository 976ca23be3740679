//! # Logging
//!
//! Installs a `tracing-subscriber` fmt subscriber for the `tracing` events
//! the contexts emit. `RUST_LOG` takes precedence over the configured
//! filter.

use std::error::Error;
use std::io;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor a custom filter is set
pub const DEFAULT_FILTER: &str = "stowage=info";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Environment filter (e.g. "stowage=debug,stowage_table=trace")
    pub env_filter: String,
    /// Emit JSON lines instead of plain text
    pub json_format: bool,
    /// Include file and line number information
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: DEFAULT_FILTER.to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    /// JSON output at info level
    pub fn production() -> Self {
        Self {
            json_format: true,
            ..Self::default()
        }
    }

    /// Debug output for every stowage crate, with source locations
    pub fn development() -> Self {
        Self {
            env_filter: "stowage=debug,stowage_core=debug,stowage_table=debug,stowage_blob=debug,stowage_queue=debug"
                .to_string(),
            json_format: false,
            include_location: true,
        }
    }

    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = filter.into();
        self
    }
}

/// Install the global subscriber.
///
/// Fails when the filter does not parse or a global subscriber is already
/// installed, so repeated calls from tests are harmless.
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.env_filter))?;

    let layer = Layer::new()
        .with_writer(io::stdout)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()?;
    }

    tracing::debug!(
        target: "stowage::logging",
        "logging initialized (filter: {}, format: {})",
        config.env_filter,
        if config.json_format { "JSON" } else { "text" }
    );
    Ok(())
}

/// Install plain text logging filtered by `RUST_LOG` or [`DEFAULT_FILTER`]
pub fn init() -> Result<(), Box<dyn Error + Send + Sync>> {
    init_logging(LoggingConfig::default())
}

/// Install plain text logging with a custom filter
pub fn init_with_filter(filter: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    init_logging(LoggingConfig::default().with_env_filter(filter))
}
