//! Session lifecycle
//!
//! Drives a connection through authenticate, connect, active handlers,
//! and disconnect.

mod auth;
mod controller;

pub use auth::{AuthError, Identity};
pub use controller::LifecycleController;
