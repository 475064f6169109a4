//! # msgflow: Flow-based Dataflow Runtime
//!
//! msgflow runs a set of independently scheduled **components**, wired
//! together by a **graph**, that exchange data through a shared **message
//! bus** of bounded queues and trigger streams. Components never address
//! each other directly: they read and write named ports, and the built-in
//! **router** forwards data between ports according to graph edges. The
//! topology can be hot reloaded (nodes added, removed, updated) without
//! stopping the network.
//!
//! ## Core Concepts
//!
//! - **Network**: one running instance of a wired component graph plus its bus
//! - **Graph**: a topology snapshot (nodes + connections) and its derived
//!   routing index
//! - **Component**: a unit with `setup`/`process`/`teardown` lifecycle hooks,
//!   driven by bus triggers
//! - **Router**: the built-in component that fans data out along graph edges
//! - **Data queue**: bounded FIFO buffer holding payloads for one port
//! - **Trigger stream**: bounded append-log used purely to wake a listener
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use msgflow::bus::{BusConfig, MessageBus};
//! use msgflow::network::{Network, NetworkConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> miette::Result<()> {
//! let topology = r#"{
//!     "processes": {
//!         "source": { "type": "default" },
//!         "sink":   { "type": "default" }
//!     },
//!     "connections": [
//!         { "src": { "process": "source", "port": "out" },
//!           "tgt": { "process": "sink",   "port": "in" } }
//!     ]
//! }"#;
//!
//! let bus = Arc::new(MessageBus::in_memory(BusConfig::default()));
//! let network = Network::new(bus, NetworkConfig::default().with_id("demo"));
//! network.load_topology(topology).await?;
//!
//! network.start().await;
//! // ... components now process triggers as data flows ...
//! network.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Delivery Model
//!
//! Data writes and scheduling are decoupled: every data write publishes
//! exactly one trigger on the owning node's event stream, but components are
//! level-triggered: a wake means "check your queues again", never "consume
//! this exact payload". Coalesced, duplicated, or spurious wakes are
//! therefore harmless, and a handler failure on one node never stalls the
//! bus or its siblings.
//!
//! ## Module Guide
//!
//! - [`types`] - Bus coordinates ([`types::MsgId`], [`types::EventId`]) and
//!   wire records ([`types::Envelope`], [`types::Trigger`])
//! - [`store`] - Atomic queue/stream primitives and the in-memory backend
//! - [`bus`] - The message bus and listener registration
//! - [`graph`] - Topology parsing, routing index, structural diffing
//! - [`context`] - Per-node addressing and the input/output facade
//! - [`component`] - The component trait and lifecycle hooks
//! - [`router`] - The built-in fan-out component
//! - [`network`] - Orchestration, lifecycle state machine, hot reload
//! - [`telemetry`] - Tracing subscriber setup

pub mod bus;
pub mod component;
pub mod context;
pub mod graph;
pub mod network;
pub mod router;
pub mod store;
pub mod telemetry;
pub mod types;
