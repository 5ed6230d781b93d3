//! sway IPC transport: wire codec, synchronous request/reply client, and a
//! concurrent event-subscription dispatcher.
//!
//! Two independent connections are used. A [`client::Client`] performs
//! mutex-serialized request/reply calls; a [`subscription::Subscription`]
//! owns a dedicated connection and fans incoming events out to registered
//! handlers without letting any handler stall frame delivery.

pub mod client;
pub mod codec;
pub mod event;
pub mod message;
pub mod node;
pub mod reply;
pub mod subscription;

pub use client::Client;
pub use codec::ByteOrder;
pub use message::{EventType, PayloadType};
pub use node::Node;
pub use subscription::{Cookie, MonitoringError, Subscription};
