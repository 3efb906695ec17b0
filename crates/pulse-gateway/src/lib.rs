//! # pulse-gateway
//!
//! WebSocket gateway: accepts client connections, drives the session
//! lifecycle, and fans presence and message events out across workers.

pub mod broadcast;
pub mod connection;
pub mod lifecycle;
pub mod protocol;
pub mod server;

pub use server::run;
