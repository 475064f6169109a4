//! Topologies and small async helpers shared across integration tests.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use msgflow::bus::{BusConfig, MessageBus};
use msgflow::graph::Graph;
use msgflow::store::MemoryStore;

/// One producer fanning out to two consumers: `a.out -> b.in`, `a.out -> c.in`.
pub const FANOUT_TOPOLOGY: &str = r#"{
    "processes": {
        "a": { "type": "default" },
        "b": { "type": "default" },
        "c": { "type": "default" }
    },
    "connections": [
        { "src": { "process": "a", "port": "out" },
          "tgt": { "process": "b", "port": "in" } },
        { "src": { "process": "a", "port": "out" },
          "tgt": { "process": "c", "port": "in" } }
    ]
}"#;

pub fn fanout_graph() -> Graph {
    Graph::parse(FANOUT_TOPOLOGY).expect("fixture topology parses")
}

/// Bus over an inspectable [`MemoryStore`].
pub fn test_bus() -> (Arc<MemoryStore>, Arc<MessageBus>) {
    test_bus_with(BusConfig::default())
}

pub fn test_bus_with(config: BusConfig) -> (Arc<MemoryStore>, Arc<MessageBus>) {
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(MessageBus::new(store.clone(), config));
    (store, bus)
}

/// Poll `cond` until it holds or `timeout` elapses.
pub async fn wait_for(cond: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
