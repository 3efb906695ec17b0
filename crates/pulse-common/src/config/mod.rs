//! Configuration structs

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, BalancingStrategy, ClusterConfig, ConfigError, Environment,
    RedisConfig, ServerConfig,
};
