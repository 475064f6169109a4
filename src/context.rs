//! Per-node addressing helpers and the input/output facade handed to
//! components.
//!
//! A [`Context`] is built per (source-node, target-node) pair: [`Input`]
//! resolves port names against the source node's coordinates, [`Output`]
//! against the target's (the router, by default). Components only ever see
//! this facade, never raw bus keys.

use serde_json::Value;
use std::sync::Arc;

use crate::bus::MessageBus;
use crate::store::StoreError;
use crate::types::{
    Envelope, EventId, MsgId, Trigger, DEFAULT_FROM_PORT, DEFAULT_SEPARATOR,
};
use rustc_hash::FxHashMap;

/// Key-building knobs shared by every context of one network.
#[derive(Clone, Debug)]
pub struct Addressing {
    pub separator: String,
    pub from_port: String,
}

impl Default for Addressing {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
            from_port: DEFAULT_FROM_PORT.to_string(),
        }
    }
}

/// The (network, node) coordinates one side of a context is anchored to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeAddress {
    pub network: String,
    pub node: String,
}

impl NodeAddress {
    pub fn new(network: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            node: node.into(),
        }
    }

    pub fn msg_id(&self, port: impl Into<String>) -> MsgId {
        MsgId::new(self.network.clone(), self.node.clone(), port)
    }

    pub fn event_id(&self) -> EventId {
        EventId::new(self.network.clone(), self.node.clone())
    }
}

/// Either a bare port name resolved against the anchor node, or a fully
/// qualified queue address.
#[derive(Clone, Debug)]
pub enum PortSelector {
    Named(String),
    Full(MsgId),
}

impl From<&str> for PortSelector {
    fn from(port: &str) -> Self {
        Self::Named(port.to_string())
    }
}

impl From<String> for PortSelector {
    fn from(port: String) -> Self {
        Self::Named(port)
    }
}

impl From<&String> for PortSelector {
    fn from(port: &String) -> Self {
        Self::Named(port.clone())
    }
}

impl From<MsgId> for PortSelector {
    fn from(mid: MsgId) -> Self {
        Self::Full(mid)
    }
}

fn resolve(anchor: &NodeAddress, selector: PortSelector) -> MsgId {
    match selector {
        PortSelector::Named(port) => anchor.msg_id(port),
        PortSelector::Full(mid) => mid,
    }
}

/// Read side of a context, anchored to the source node.
#[derive(Clone)]
pub struct Input {
    bus: Arc<MessageBus>,
    source: NodeAddress,
    addressing: Addressing,
}

impl Input {
    /// True iff at least `count` entries wait on the resolved queue.
    pub async fn has_data(
        &self,
        port: impl Into<PortSelector>,
        count: usize,
    ) -> Result<bool, StoreError> {
        let mid = resolve(&self.source, port.into());
        self.bus
            .has_data(&mid.key(&self.addressing.separator), count)
            .await
    }

    /// Pop the oldest entry from the resolved queue, if any.
    pub async fn get_data(
        &self,
        port: impl Into<PortSelector>,
    ) -> Result<Option<Value>, StoreError> {
        let mid = resolve(&self.source, port.into());
        self.bus.get_data(&mid.key(&self.addressing.separator)).await
    }

    /// Pop up to `count` oldest entries from the resolved queue.
    pub async fn get_data_many(
        &self,
        port: impl Into<PortSelector>,
        count: usize,
    ) -> Result<Vec<Value>, StoreError> {
        let mid = resolve(&self.source, port.into());
        self.bus
            .get_data_many(&mid.key(&self.addressing.separator), count)
            .await
    }
}

/// Write side of a context, anchored to the target node.
#[derive(Clone)]
pub struct Output {
    bus: Arc<MessageBus>,
    source: NodeAddress,
    target: NodeAddress,
    addressing: Addressing,
}

impl Output {
    /// Write `value` to the resolved data queue, then publish exactly one
    /// trigger on the owning node's event stream. The two writes are never
    /// separated: every payload delivery implies a wake.
    pub async fn send_data(
        &self,
        port: impl Into<PortSelector>,
        value: Value,
    ) -> Result<(), StoreError> {
        let mid = resolve(&self.target, port.into());
        let eid = mid.event_id();
        let separator = &self.addressing.separator;
        self.bus.send_data(&mid.key(separator), value).await?;
        self.bus
            .send_event(&eid.key(separator), Trigger::wake())
            .await
    }

    /// Send a `{network, node, data}` envelope to the target's inbound
    /// aggregation port, the shape the router consumes.
    pub async fn send(&self, data: FxHashMap<String, Value>) -> Result<(), StoreError> {
        let envelope = Envelope::data(self.source.network.clone(), self.source.node.clone(), data);
        self.send_data(self.addressing.from_port.clone(), envelope.into_value())
            .await
    }

    /// Send a `{network, node, error}` envelope for out-of-band failure
    /// signaling.
    pub async fn send_error(&self, error: Value) -> Result<(), StoreError> {
        let envelope =
            Envelope::error(self.source.network.clone(), self.source.node.clone(), error);
        self.send_data(self.addressing.from_port.clone(), envelope.into_value())
            .await
    }
}

/// Everything a component gets to interact with its environment.
#[derive(Clone)]
pub struct Context {
    pub bus: Arc<MessageBus>,
    pub input: Input,
    pub output: Output,
}

impl Context {
    pub fn new(
        bus: Arc<MessageBus>,
        source: NodeAddress,
        target: NodeAddress,
        addressing: Addressing,
    ) -> Self {
        let input = Input {
            bus: Arc::clone(&bus),
            source: source.clone(),
            addressing: addressing.clone(),
        };
        let output = Output {
            bus: Arc::clone(&bus),
            source,
            target,
            addressing,
        };
        Self { bus, input, output }
    }
}
