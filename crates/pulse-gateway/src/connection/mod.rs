//! Connection state and the per-worker room registry.

mod connection;
mod registry;

pub use connection::Connection;
pub use registry::RoomRegistry;
