//! Application configuration structs
//!
//! Loads configuration from environment variables (optionally via a `.env`
//! file).

use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub cluster: ClusterConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Listen address for the gateway
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Redis configuration (shared by stores and the fan-out bus)
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
}

/// Worker-pool and routing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    /// Identifier of this worker within the pool.
    #[serde(default)]
    pub worker_id: u32,
    /// Number of workers the sticky routing master keeps alive.
    #[serde(default = "default_workers_count")]
    pub workers_count: u32,
    #[serde(default)]
    pub balancing: BalancingStrategy,
    /// Bound for cluster-wide membership aggregation.
    #[serde(default = "default_membership_timeout_ms")]
    pub membership_timeout_ms: u64,
}

/// Load-balancing strategy for the sticky router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BalancingStrategy {
    Random,
    RoundRobin,
    #[default]
    LeastConnection,
}

impl FromStr for BalancingStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(Self::Random),
            "round-robin" => Ok(Self::RoundRobin),
            "least-connection" => Ok(Self::LeastConnection),
            other => Err(ConfigError::InvalidValue(
                "BALANCING_STRATEGY",
                other.to_string(),
            )),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "pulse".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7076
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_redis_max_connections() -> u32 {
    16
}

fn default_workers_count() -> u32 {
    4
}

fn default_membership_timeout_ms() -> u64 {
    250
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is present but unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("APP_ENV")
                    .ok()
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| default_host()),
                port: parse_var("PORT", default_port())?,
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").unwrap_or_else(|_| default_redis_url()),
                max_connections: parse_var("REDIS_MAX_CONNECTIONS", default_redis_max_connections())?,
            },
            cluster: ClusterConfig {
                worker_id: parse_var("WORKER_ID", 0)?,
                workers_count: parse_var("WORKERS_COUNT", default_workers_count())?,
                balancing: match env::var("BALANCING_STRATEGY") {
                    Ok(s) => s.parse()?,
                    Err(_) => BalancingStrategy::default(),
                },
                membership_timeout_ms: parse_var("MEMBERSHIP_TIMEOUT_MS", default_membership_timeout_ms())?,
            },
        })
    }
}

/// Parse an env var, falling back to a default when unset but erroring when
/// present and malformed.
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
