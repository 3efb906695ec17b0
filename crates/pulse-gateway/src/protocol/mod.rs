//! Wire protocol
//!
//! JSON text frames of the shape `{"event": <name>, "data": <payload>}`.

mod events;
mod frame;
mod handshake;

pub use events::{ClientEvent, RosterEntry, ServerEvent, SessionPayload};
pub use frame::{Frame, ProtocolError};
pub use handshake::Handshake;
