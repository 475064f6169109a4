//! Shared coordinate and wire types for the msgflow runtime.
//!
//! Everything on the bus is addressed by a string key derived from one of two
//! coordinates: a [`MsgId`] (`network.node.port`) names a data queue, an
//! [`EventId`] (`network.node`) names a trigger stream. The [`Envelope`] is
//! the record the router consumes and produces; the [`Trigger`] is the
//! minimal payload carried on trigger streams.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Default addressing separator between key segments.
pub const DEFAULT_SEPARATOR: &str = ".";
/// Default inbound aggregation port consumed by the router.
pub const DEFAULT_FROM_PORT: &str = "from";
/// Default node id reserved for the built-in router component.
pub const DEFAULT_ROUTER_ID: &str = "router";
/// Default component type discriminator.
pub const DEFAULT_COMPONENT_TYPE: &str = "default";

/// One endpoint of a graph connection: a port on a node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    pub node: String,
    pub port: String,
}

impl PortRef {
    pub fn new(node: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{DEFAULT_SEPARATOR}{}", self.node, self.port)
    }
}

/// Address of one data queue: `(network, node, port)`.
///
/// Collapses to the bus key `<network><sep><node><sep><port>`. The key string
/// is the sole coordinate space the bus understands; two processes sharing a
/// store interoperate whenever they agree on network id and separator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MsgId {
    pub network: String,
    pub node: String,
    pub port: String,
}

impl MsgId {
    pub fn new(
        network: impl Into<String>,
        node: impl Into<String>,
        port: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            node: node.into(),
            port: port.into(),
        }
    }

    /// Collapse to the bus key string.
    pub fn key(&self, separator: &str) -> String {
        format!(
            "{}{separator}{}{separator}{}",
            self.network, self.node, self.port
        )
    }

    /// The trigger-stream address of the node this queue belongs to.
    pub fn event_id(&self) -> EventId {
        EventId {
            network: self.network.clone(),
            node: self.node.clone(),
        }
    }
}

/// Address of one trigger stream: `(network, node)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId {
    pub network: String,
    pub node: String,
}

impl EventId {
    pub fn new(network: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            node: node.into(),
        }
    }

    /// Collapse to the bus key string.
    pub fn key(&self, separator: &str) -> String {
        format!("{}{separator}{}", self.network, self.node)
    }
}

/// The record carried on the router's inbound port.
///
/// `data` maps source-port names to payloads; `error` carries an out-of-band
/// failure signal instead. Exactly one of the two is expected to be present
/// on the wire.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub network: String,
    pub node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<FxHashMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl Envelope {
    /// Envelope carrying a port-name to payload mapping.
    pub fn data(
        network: impl Into<String>,
        node: impl Into<String>,
        data: FxHashMap<String, Value>,
    ) -> Self {
        Self {
            network: network.into(),
            node: node.into(),
            data: Some(data),
            error: None,
        }
    }

    /// Envelope carrying an out-of-band error signal.
    pub fn error(network: impl Into<String>, node: impl Into<String>, error: Value) -> Self {
        Self {
            network: network.into(),
            node: node.into(),
            data: None,
            error: Some(error),
        }
    }

    /// Infallible conversion to the wire JSON shape.
    pub fn into_value(self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("network".into(), Value::String(self.network));
        map.insert("node".into(), Value::String(self.node));
        if let Some(data) = self.data {
            map.insert("data".into(), Value::Object(data.into_iter().collect()));
        }
        if let Some(error) = self.error {
            map.insert("error".into(), error);
        }
        Value::Object(map)
    }
}

/// Minimal payload carried on a trigger stream.
///
/// Triggers mean "something changed for you, check again" and carry no
/// routable data; components re-check their queues rather than trusting the
/// payload, so coalesced or spurious wakes are harmless.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "type")]
    pub kind: String,
}

impl Trigger {
    pub const WAKE: &'static str = "trigger";
    pub const STARTUP: &'static str = "startup";

    /// The ordinary wake published after every data write.
    pub fn wake() -> Self {
        Self {
            kind: Self::WAKE.into(),
        }
    }

    /// Synthetic trigger dispatched once when a listener starts, so data that
    /// arrived before the listener existed is drained.
    pub fn startup() -> Self {
        Self {
            kind: Self::STARTUP.into(),
        }
    }

    pub fn is_startup(&self) -> bool {
        self.kind == Self::STARTUP
    }

    /// Infallible conversion to the wire JSON shape.
    pub fn into_value(self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("type".into(), Value::String(self.kind));
        Value::Object(map)
    }

    /// Lenient parse: any unrecognized payload is treated as a plain wake,
    /// since trigger consumption is level-triggered anyway.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_else(|_| Self::wake())
    }
}
