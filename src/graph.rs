//! Topology snapshots: node set, connection list, and the derived routing
//! index.
//!
//! A [`Graph`] is immutable once constructed; each topology version is a new
//! instance. [`Graph::diff`] computes the structural difference between two
//! versions, which drives hot reconfiguration in
//! [`Network::update_from_graph`](crate::network::Network::update_from_graph).

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::types::{PortRef, DEFAULT_COMPONENT_TYPE};

/// Errors raised while constructing a graph. No partial graph is ever
/// returned.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("malformed topology document")]
    #[diagnostic(
        code(msgflow::graph::parse),
        help("Expected a JSON object with `processes` and `connections`.")
    )]
    Parse(#[source] serde_json::Error),

    #[error("connection references undeclared process '{process}'")]
    #[diagnostic(
        code(msgflow::graph::unknown_endpoint),
        help("Every connection endpoint must name a process declared under `processes`.")
    )]
    UnknownEndpoint { process: String },
}

/// One endpoint record of the topology document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub process: String,
    pub port: String,
}

/// One connection record of the topology document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub src: EndpointSpec,
    pub tgt: EndpointSpec,
}

/// The topology description format consumed by [`Graph::from_topology`].
///
/// `processes` maps node ids to free-form attribute bags; each bag should
/// carry a `type` field understood by the network's component factory.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub processes: BTreeMap<String, Value>,
    #[serde(default)]
    pub connections: Vec<ConnectionSpec>,
}

/// Per-node descriptor handed to the component factory.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeSpec {
    pub id: String,
    /// The `type` discriminator from the attribute bag, `"default"` if absent.
    pub node_type: String,
    /// The full attribute bag, `type` included. Diffing compares this
    /// structurally.
    pub attributes: Value,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, attributes: Value) -> Self {
        let node_type = attributes
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_COMPONENT_TYPE)
            .to_string();
        Self {
            id: id.into(),
            node_type,
            attributes,
        }
    }
}

/// A directed connection between two ports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    pub src: PortRef,
    pub tgt: PortRef,
}

/// Structural difference between two graph versions.
///
/// The three sets are disjoint; node identity is the id string, attribute
/// equality is structural. A node present in both versions with identical
/// attributes appears in none of them.
#[derive(Clone, Debug, Default)]
pub struct GraphDiff {
    pub added: Vec<NodeSpec>,
    pub removed: Vec<NodeSpec>,
    pub updated: Vec<NodeSpec>,
}

/// An immutable topology snapshot plus its derived routing index.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<NodeSpec>,
    by_id: FxHashMap<String, usize>,
    connections: Vec<Connection>,
    route_index: FxHashMap<PortRef, Vec<PortRef>>,
}

impl Graph {
    /// Parse a JSON topology document.
    pub fn parse(document: &str) -> Result<Self, GraphError> {
        let topology: Topology = serde_json::from_str(document).map_err(GraphError::Parse)?;
        Self::from_topology(topology)
    }

    /// Build a graph from an already-parsed topology description.
    pub fn from_topology(topology: Topology) -> Result<Self, GraphError> {
        let mut nodes = Vec::with_capacity(topology.processes.len());
        let mut by_id = FxHashMap::default();
        for (id, attributes) in topology.processes {
            by_id.insert(id.clone(), nodes.len());
            nodes.push(NodeSpec::new(id, attributes));
        }

        let mut connections = Vec::with_capacity(topology.connections.len());
        let mut route_index: FxHashMap<PortRef, Vec<PortRef>> = FxHashMap::default();
        for spec in topology.connections {
            for endpoint in [&spec.src, &spec.tgt] {
                if !by_id.contains_key(&endpoint.process) {
                    return Err(GraphError::UnknownEndpoint {
                        process: endpoint.process.clone(),
                    });
                }
            }
            let src = PortRef::new(spec.src.process, spec.src.port);
            let tgt = PortRef::new(spec.tgt.process, spec.tgt.port);
            route_index
                .entry(src.clone())
                .or_default()
                .push(tgt.clone());
            connections.push(Connection { src, tgt });
        }

        Ok(Self {
            nodes,
            by_id,
            connections,
            route_index,
        })
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.by_id.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Destination ports wired from the given source port, in connection
    /// order. Empty when the port has no matching connection.
    pub fn next_ports(&self, source: &PortRef) -> &[PortRef] {
        self.route_index
            .get(source)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Compute added/removed/updated node sets relative to `previous`.
    ///
    /// `self` is the newer version. With no previous graph every node is
    /// `added`.
    pub fn diff(&self, previous: Option<&Graph>) -> GraphDiff {
        let Some(previous) = previous else {
            return GraphDiff {
                added: self.nodes.clone(),
                ..Default::default()
            };
        };

        let mut diff = GraphDiff::default();
        for node in &self.nodes {
            match previous.node(&node.id) {
                None => diff.added.push(node.clone()),
                Some(old) if old.attributes != node.attributes => {
                    diff.updated.push(node.clone());
                }
                Some(_) => {}
            }
        }
        for node in &previous.nodes {
            if self.node(&node.id).is_none() {
                diff.removed.push(node.clone());
            }
        }
        diff
    }
}
