//! Redis session store

mod redis_session;

pub use redis_session::RedisSessionStore;
