//! # pulse-core
//!
//! Domain layer containing identifiers, session and message records, and the
//! store traits. This crate has zero dependencies on infrastructure
//! (Redis, web framework, etc.).

pub mod error;
pub mod ids;
pub mod message;
pub mod session;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::StoreError;
pub use ids::{SessionId, SocketId, UserId, WorkerId};
pub use message::{group_by_counterpart, MessageRecord};
pub use session::{SessionPatch, SessionRecord};
pub use traits::{MessageStore, SessionStore, StoreResult};
