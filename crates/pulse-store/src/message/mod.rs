//! Redis message store

mod redis_message;

pub use redis_message::RedisMessageStore;
