//! Redis connection pool using deadpool-redis.
//!
//! Provides a managed pool of Redis connections plus JSON value helpers
//! shared by the session and message stores.

use deadpool_redis::{Config, Pool, Runtime};
use pulse_core::StoreError;
use redis::AsyncCommands;

/// Redis pool configuration
#[derive(Debug, Clone)]
pub struct RedisPoolConfig {
    /// Redis connection URL (e.g., `redis://localhost:6379`)
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: usize,
}

impl Default for RedisPoolConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 16,
        }
    }
}

impl From<&pulse_common::RedisConfig> for RedisPoolConfig {
    fn from(config: &pulse_common::RedisConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections as usize,
        }
    }
}

/// Error type for Redis pool operations
#[derive(Debug, thiserror::Error)]
pub enum RedisPoolError {
    #[error("Failed to create Redis pool: {0}")]
    CreatePool(String),

    #[error("Failed to get connection from pool: {0}")]
    GetConnection(#[from] deadpool_redis::PoolError),

    #[error("Redis command error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<RedisPoolError> for StoreError {
    /// Classify pool errors into the store taxonomy. Authentication
    /// rejections and unreachable backends are fatal (the original stopped
    /// the worker on `ERR invalid password`); everything else propagates to
    /// the attempted operation.
    fn from(err: RedisPoolError) -> Self {
        match err {
            RedisPoolError::Redis(e) => {
                if e.kind() == redis::ErrorKind::AuthenticationFailed
                    || matches!(e.code(), Some("NOAUTH" | "WRONGPASS"))
                    || e.to_string().contains("invalid password")
                {
                    StoreError::Unauthorized(e.to_string())
                } else if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() {
                    StoreError::Unavailable(e.to_string())
                } else {
                    StoreError::Backend(e.to_string())
                }
            }
            RedisPoolError::GetConnection(e) => StoreError::Unavailable(e.to_string()),
            RedisPoolError::CreatePool(msg) => StoreError::Unavailable(msg),
            RedisPoolError::Serialization(e) => StoreError::Serialization(e),
        }
    }
}

/// Result type for Redis pool operations
pub type RedisResult<T> = Result<T, RedisPoolError>;

/// Managed Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    pool: Pool,
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPool")
            .field("status", &self.pool.status())
            .finish()
    }
}

impl RedisPool {
    /// Create a new Redis pool with the given configuration
    pub fn new(config: RedisPoolConfig) -> RedisResult<Self> {
        let cfg = Config::from_url(&config.url);
        let pool = cfg
            .builder()
            .map_err(|e| RedisPoolError::CreatePool(e.to_string()))?
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| RedisPoolError::CreatePool(e.to_string()))?;

        // Redact credentials from URL for logging
        let safe_url = config.url.split('@').next_back().unwrap_or(&config.url);
        tracing::info!(
            url = %safe_url,
            max_connections = config.max_connections,
            "Redis pool created"
        );

        Ok(Self { pool })
    }

    /// Create a new Redis pool from pulse-common config
    pub fn from_config(config: &pulse_common::RedisConfig) -> RedisResult<Self> {
        Self::new(RedisPoolConfig::from(config))
    }

    /// Get a connection from the pool
    pub async fn get(&self) -> RedisResult<deadpool_redis::Connection> {
        self.pool.get().await.map_err(RedisPoolError::GetConnection)
    }

    /// Check if the pool is healthy by pinging Redis
    pub async fn health_check(&self) -> RedisResult<()> {
        let mut conn = self.get().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    /// Set a key to a JSON-serialized value
    pub async fn set<V: serde::Serialize>(&self, key: &str, value: &V) -> RedisResult<()> {
        let mut conn = self.get().await?;
        let serialized = serde_json::to_string(value)?;
        conn.set::<_, _, ()>(key, &serialized).await?;
        Ok(())
    }

    /// Get a JSON-deserialized value by key
    pub async fn get_value<V: serde::de::DeserializeOwned>(&self, key: &str) -> RedisResult<Option<V>> {
        let mut conn = self.get().await?;
        let value: Option<String> = conn.get(key).await?;

        match value {
            Some(v) => Ok(Some(serde_json::from_str(&v)?)),
            None => Ok(None),
        }
    }

    /// Append a JSON-serialized value to a list
    pub async fn rpush<V: serde::Serialize>(&self, key: &str, value: &V) -> RedisResult<()> {
        let mut conn = self.get().await?;
        let serialized = serde_json::to_string(value)?;
        conn.rpush::<_, _, ()>(key, &serialized).await?;
        Ok(())
    }

    /// Fetch a whole list of raw JSON strings in storage order
    pub async fn lrange_all(&self, key: &str) -> RedisResult<Vec<String>> {
        let mut conn = self.get().await?;
        let items: Vec<String> = conn.lrange(key, 0, -1).await?;
        Ok(items)
    }

    /// Scan keys matching a pattern using cursor-based iteration.
    ///
    /// Cursor-based SCAN rather than KEYS; KEYS is O(N) and blocks Redis.
    pub async fn scan_keys(&self, pattern: &str, count: usize) -> RedisResult<Vec<String>> {
        let mut conn = self.get().await?;
        let mut cursor: u64 = 0;
        let mut all_keys = Vec::new();

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(count)
                .query_async(&mut conn)
                .await?;

            all_keys.extend(keys);
            cursor = next_cursor;

            if cursor == 0 {
                break;
            }
        }

        Ok(all_keys)
    }
}
