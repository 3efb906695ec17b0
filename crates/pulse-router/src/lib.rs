//! # pulse-router
//!
//! Sticky connection routing: pins each logical connection to one worker
//! process for its lifetime, so that process-local handshake and registry
//! state stays on the worker that created it.

pub mod error;
pub mod sticky;

pub use error::RouterError;
pub use sticky::StickyRouter;
