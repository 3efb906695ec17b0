//! # pulse-bus
//!
//! Cross-process fan-out: bridges each worker's in-process event delivery
//! so that publishing to a room reaches sockets on every worker, and
//! membership queries return the union across all workers rather than one
//! process's local view.

pub mod channels;
pub mod envelope;
pub mod error;
pub mod fanout;
pub mod membership;
pub mod publisher;
pub mod subscriber;

pub use channels::BusChannel;
pub use envelope::{Delivery, Envelope};
pub use error::{BusError, BusResult};
pub use fanout::{FanOutBus, RedisFanOutBus, RedisFanOutBusConfig};
pub use membership::{MembershipQuery, MembershipReply, MembershipView};
pub use publisher::Publisher;
pub use subscriber::{Subscriber, SubscriberConfig};
