//! The message bus: addressable bounded data queues and trigger streams.
//!
//! The bus is the only component that talks to the [`Store`](crate::store::Store);
//! everything above it references string bus keys and never the store
//! directly. Two channel kinds share the key space:
//!
//! - **Data queues** (`network.node.port`): bounded FIFO buffers holding
//!   arbitrary payloads, drop-oldest on overflow.
//! - **Trigger streams** (`network.node`): bounded append-logs used purely to
//!   wake a listener. Payload delivery and scheduling are decoupled: a
//!   component is woken whenever *something* changed for it, then
//!   independently decides what to consume, tolerating coalesced or spurious
//!   wakes.
//!
//! Listener registration guarantees at most one active consumer per key;
//! re-registering cancels the previous listener first.

mod config;
mod listener;
mod message_bus;

pub use config::BusConfig;
pub use listener::{EventHandler, HandlerError};
pub use message_bus::MessageBus;
