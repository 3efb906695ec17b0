//! # pulse-store
//!
//! Redis-backed implementations of the session and message stores. Both
//! stores share one connection pool; any worker can resolve any session.

pub mod message;
pub mod pool;
pub mod session;

pub use message::RedisMessageStore;
pub use pool::{RedisPool, RedisPoolConfig, RedisPoolError, RedisResult};
pub use session::RedisSessionStore;
