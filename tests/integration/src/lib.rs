//! Integration test utilities for the presence relay
//!
//! Provides in-memory store doubles, an in-process multi-worker bus, and a
//! worker harness for driving full session lifecycles without Redis or
//! real sockets.

pub mod harness;
pub mod memory;

pub use cluster::{LocalBus, LocalCluster};
pub use harness::{expect_event, handshake, no_event, settle, TestWorker};
pub use memory::{MemoryMessageStore, MemorySessionStore};
