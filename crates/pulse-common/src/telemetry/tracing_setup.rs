//! Tracing and logging setup
//!
//! Configures the `tracing` subscriber with environment-based filtering.
//! Production gets JSON output, development a pretty format.

use tracing::Level;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::config::Environment;

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level filter when `RUST_LOG` is unset
    pub level: Level,
    /// Enable JSON output format
    pub json: bool,
    /// Include file and line numbers
    pub file_line: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json: false,
            file_line: true,
        }
    }
}

impl TracingConfig {
    /// Pick the configuration matching the application environment.
    #[must_use]
    pub fn for_env(env: Environment) -> Self {
        if env.is_production() {
            Self {
                level: Level::INFO,
                json: true,
                file_line: false,
            }
        } else {
            Self {
                level: Level::DEBUG,
                json: false,
                file_line: true,
            }
        }
    }
}

/// Initialize the tracing subscriber with default configuration.
///
/// Uses `RUST_LOG` for filtering if set, otherwise the configured level.
///
/// # Panics
/// Panics if a subscriber is already installed.
pub fn init_tracing() {
    init_tracing_with_config(TracingConfig::default());
}

/// Initialize the tracing subscriber with custom configuration.
///
/// # Panics
/// Panics if a subscriber is already installed.
pub fn init_tracing_with_config(config: TracingConfig) {
    let env_filter = env_filter(&config);

    if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer(&config))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(pretty_layer(&config))
            .init();
    }
}

/// Try to initialize tracing, tolerating an already-installed subscriber.
pub fn try_init_tracing() -> Result<(), TracingError> {
    try_init_tracing_with_config(TracingConfig::default())
}

/// Try to initialize tracing with custom configuration.
pub fn try_init_tracing_with_config(config: TracingConfig) -> Result<(), TracingError> {
    let env_filter = env_filter(&config);

    let result = if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer(&config))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(pretty_layer(&config))
            .try_init()
    };

    result.map_err(|_| TracingError::AlreadyInitialized)
}

fn env_filter(config: &TracingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()))
}

fn json_layer<S>(config: &TracingConfig) -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .json()
        .with_file(config.file_line)
        .with_line_number(config.file_line)
}

fn pretty_layer<S>(config: &TracingConfig) -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_file(config.file_line)
        .with_line_number(config.file_line)
}

/// Tracing initialization errors
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,
}
