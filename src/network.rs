//! Network orchestration: component lifecycle, listener wiring, and hot
//! topology reconfiguration.
//!
//! A [`Network`] owns the set of live components. Each registered component
//! gets a bus listener on its event key that invokes `process` with the
//! component's [`Context`]; lifecycle transitions follow
//! Registered → Active → Torn down. [`Network::update_from_graph`] applies a
//! graph diff with a fixed ordering that keeps the router consistent with
//! the live node set at every observable point.

use async_trait::async_trait;
use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::bus::{EventHandler, HandlerError, MessageBus};
use crate::component::Component;
use crate::context::{Addressing, Context, NodeAddress};
use crate::graph::{Graph, GraphError, NodeSpec};
use crate::router::Router;
use crate::types::{
    EventId, Trigger, DEFAULT_FROM_PORT, DEFAULT_ROUTER_ID, DEFAULT_SEPARATOR,
};

/// Failures raised by network orchestration.
#[derive(Debug, Error, Diagnostic)]
pub enum NetworkError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error("component construction failed for node '{node}': {message}")]
    #[diagnostic(
        code(msgflow::network::construction),
        help("Check the component factory registration for this node's type.")
    )]
    Construction { node: String, message: String },
}

impl NetworkError {
    pub fn construction(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Construction {
            node: node.into(),
            message: message.into(),
        }
    }
}

/// Identity and addressing configuration of one network.
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    /// Unique network id; generated when not provided.
    pub id: String,
    /// Reserved node id for the built-in router; `None` disables routing.
    pub router: Option<String>,
    pub separator: String,
    pub from_port: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            router: Some(DEFAULT_ROUTER_ID.to_string()),
            separator: DEFAULT_SEPARATOR.to_string(),
            from_port: DEFAULT_FROM_PORT.to_string(),
        }
    }
}

impl NetworkConfig {
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_router(mut self, router: impl Into<String>) -> Self {
        self.router = Some(router.into());
        self
    }

    /// Disable the built-in router; the network then only hosts externally
    /// supplied nodes and performs no fan-out.
    #[must_use]
    pub fn without_router(mut self) -> Self {
        self.router = None;
        self
    }

    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    #[must_use]
    pub fn with_from_port(mut self, from_port: impl Into<String>) -> Self {
        self.from_port = from_port.into();
        self
    }

    fn addressing(&self) -> Addressing {
        Addressing {
            separator: self.separator.clone(),
            from_port: self.from_port.clone(),
        }
    }
}

/// Instantiates components from graph node descriptors.
///
/// This is the seam where dynamically loaded component implementations plug
/// in: the network never inspects foreign code, it only calls the factory.
pub trait ComponentFactory: Send + Sync {
    fn build(&self, spec: &NodeSpec) -> Result<Arc<dyn Component>, NetworkError>;

    /// Build the router component bound to `graph`. The default constructs
    /// the built-in [`Router`]; override to instrument or replace it.
    fn build_router(
        &self,
        spec: &NodeSpec,
        graph: Arc<Graph>,
        from_port: &str,
    ) -> Result<Arc<dyn Component>, NetworkError> {
        Ok(Arc::new(
            Router::new(spec.id.clone(), graph).with_from_port(from_port),
        ))
    }
}

type Constructor =
    Box<dyn Fn(&NodeSpec) -> Result<Arc<dyn Component>, NetworkError> + Send + Sync>;

/// Type-keyed [`ComponentFactory`] with a no-op fallback.
///
/// Node types without a registered constructor resolve to
/// [`NoopComponent`](crate::component::NoopComponent), matching the
/// `"default"` discriminator behavior.
#[derive(Default)]
pub struct ComponentRegistry {
    constructors: FxHashMap<String, Constructor>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, node_type: impl Into<String>, constructor: F)
    where
        F: Fn(&NodeSpec) -> Result<Arc<dyn Component>, NetworkError> + Send + Sync + 'static,
    {
        self.constructors
            .insert(node_type.into(), Box::new(constructor));
    }

    #[must_use]
    pub fn with<F>(mut self, node_type: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&NodeSpec) -> Result<Arc<dyn Component>, NetworkError> + Send + Sync + 'static,
    {
        self.register(node_type, constructor);
        self
    }
}

impl ComponentFactory for ComponentRegistry {
    fn build(&self, spec: &NodeSpec) -> Result<Arc<dyn Component>, NetworkError> {
        match self.constructors.get(&spec.node_type) {
            Some(constructor) => constructor(spec),
            None => Ok(Arc::new(crate::component::NoopComponent::new(
                spec.id.clone(),
            ))),
        }
    }
}

/// Adapts a component to the bus listener interface.
struct NodeDispatcher {
    component: Arc<dyn Component>,
    ctx: Context,
}

#[async_trait]
impl EventHandler for NodeDispatcher {
    async fn on_trigger(&self, _trigger: Trigger) -> Result<(), HandlerError> {
        self.component.process(&self.ctx).await?;
        Ok(())
    }
}

/// One running instance of a wired component graph plus its bus.
pub struct Network {
    config: NetworkConfig,
    bus: Arc<MessageBus>,
    factory: Arc<dyn ComponentFactory>,
    nodes: Mutex<FxHashMap<String, Arc<dyn Component>>>,
    graph: Mutex<Option<Arc<Graph>>>,
    running: AtomicBool,
}

impl Network {
    /// Network with the default type-keyed registry factory.
    pub fn new(bus: Arc<MessageBus>, config: NetworkConfig) -> Self {
        Self::with_factory(bus, Arc::new(ComponentRegistry::new()), config)
    }

    pub fn with_factory(
        bus: Arc<MessageBus>,
        factory: Arc<dyn ComponentFactory>,
        config: NetworkConfig,
    ) -> Self {
        Self {
            config,
            bus,
            factory,
            nodes: Mutex::new(FxHashMap::default()),
            graph: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The most recently applied topology version, if any.
    pub fn graph(&self) -> Option<Arc<Graph>> {
        self.graph.lock().clone()
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.lock().keys().cloned().collect()
    }

    fn event_key(&self, node: &str) -> String {
        EventId::new(self.config.id.clone(), node).key(&self.config.separator)
    }

    /// Context for one node: input anchored to the node itself, output
    /// targeted at the router (or back at the node when routing is disabled).
    fn node_context(&self, node: &str) -> Context {
        let target = self
            .config
            .router
            .clone()
            .unwrap_or_else(|| node.to_string());
        Context::new(
            Arc::clone(&self.bus),
            NodeAddress::new(self.config.id.clone(), node),
            NodeAddress::new(self.config.id.clone(), target),
            self.config.addressing(),
        )
    }

    /// Register a component: build its context, add it to the node set, and
    /// wire a bus listener on its event key. If the network is running the
    /// component is activated immediately.
    pub async fn add_node(&self, component: Arc<dyn Component>) {
        let id = component.id().to_string();
        let ctx = self.node_context(&id);
        self.nodes.lock().insert(id.clone(), Arc::clone(&component));
        self.bus
            .add_listener(
                &self.event_key(&id),
                Arc::new(NodeDispatcher {
                    component: Arc::clone(&component),
                    ctx: ctx.clone(),
                }),
            )
            .await;
        tracing::debug!(network = %self.config.id, node = %id, "node registered");

        if self.running() {
            if let Err(err) = component.setup(&ctx).await {
                tracing::error!(network = %self.config.id, node = %id, error = %err, "setup failed");
            }
        }
    }

    /// Register a batch of pre-built components (headless operation, no
    /// graph required).
    pub async fn load_nodes(&self, components: Vec<Arc<dyn Component>>) {
        for component in components {
            self.add_node(component).await;
        }
    }

    /// Cancel the node's listener, tear it down if the network is running,
    /// and drop it from the node set. Returns false for unknown ids.
    pub async fn remove_node(&self, id: &str) -> bool {
        self.bus.remove_listener(&self.event_key(id)).await;
        let Some(component) = self.nodes.lock().remove(id) else {
            return false;
        };
        if self.running() {
            if let Err(err) = component.teardown().await {
                tracing::error!(network = %self.config.id, node = %id, error = %err, "teardown failed");
            }
        }
        tracing::debug!(network = %self.config.id, node = %id, "node removed");
        true
    }

    fn router_spec(&self, router_id: &str) -> NodeSpec {
        NodeSpec::new(router_id, json!({ "type": "router" }))
    }

    /// Instantiate one component per graph node via the factory, register
    /// each, then add the router bound to this graph (unless routing is
    /// disabled).
    pub async fn load_from_graph(&self, graph: Graph) -> Result<(), NetworkError> {
        let graph = Arc::new(graph);
        for spec in graph.nodes() {
            let component = self.factory.build(spec)?;
            self.add_node(component).await;
        }
        if let Some(router_id) = self.config.router.clone() {
            let router = self.factory.build_router(
                &self.router_spec(&router_id),
                Arc::clone(&graph),
                &self.config.from_port,
            )?;
            self.add_node(router).await;
        }
        *self.graph.lock() = Some(graph);
        Ok(())
    }

    /// Parse a topology document and load it. File I/O is the caller's
    /// business; the input is the document text.
    pub async fn load_topology(&self, document: &str) -> Result<(), NetworkError> {
        self.load_from_graph(Graph::parse(document)?).await
    }

    /// Hot-reload protocol. The ordering is an invariant, not an
    /// implementation detail:
    ///
    /// 1. remove the current router (stop routing before mutating topology);
    /// 2. diff the new graph against the previous version;
    /// 3. remove every removed node;
    /// 4. re-create every updated node (remove then add, forcing a fresh
    ///    `setup` with the new attributes);
    /// 5. add every added node;
    /// 6. add a new router bound to the new graph;
    /// 7. store the new graph as current.
    ///
    /// The router therefore never runs against a graph that does not match
    /// the live node set. If a factory call fails midway, node changes made
    /// up to that point persist, the previous graph stays current, and a
    /// router bound to it is re-added before the error is returned: a loaded
    /// network never stays routerless.
    pub async fn update_from_graph(&self, graph: Graph) -> Result<(), NetworkError> {
        let graph = Arc::new(graph);
        let previous = self.graph.lock().clone();

        if let Some(router_id) = self.config.router.clone() {
            self.remove_node(&router_id).await;
        }

        let applied = self.apply_diff(&graph, previous.as_deref()).await;
        let bind_to = match &applied {
            Ok(()) => Some(Arc::clone(&graph)),
            Err(err) => {
                tracing::error!(
                    network = %self.config.id,
                    error = %err,
                    "topology update failed, restoring router on previous graph"
                );
                previous
            }
        };

        if let (Some(router_id), Some(bind_to)) = (self.config.router.clone(), bind_to) {
            let router = self.factory.build_router(
                &self.router_spec(&router_id),
                bind_to,
                &self.config.from_port,
            )?;
            self.add_node(router).await;
        }

        applied?;
        *self.graph.lock() = Some(graph);
        Ok(())
    }

    async fn apply_diff(
        &self,
        graph: &Arc<Graph>,
        previous: Option<&Graph>,
    ) -> Result<(), NetworkError> {
        let diff = graph.diff(previous);
        tracing::info!(
            network = %self.config.id,
            added = diff.added.len(),
            removed = diff.removed.len(),
            updated = diff.updated.len(),
            "applying topology update"
        );

        for spec in &diff.removed {
            self.remove_node(&spec.id).await;
        }
        for spec in &diff.updated {
            self.remove_node(&spec.id).await;
            let component = self.factory.build(spec)?;
            self.add_node(component).await;
        }
        for spec in &diff.added {
            let component = self.factory.build(spec)?;
            self.add_node(component).await;
        }
        Ok(())
    }

    /// Parse a topology document and hot-reload it.
    pub async fn update(&self, document: &str) -> Result<(), NetworkError> {
        self.update_from_graph(Graph::parse(document)?).await
    }

    /// Activate every registered node. Idempotent; a second call while
    /// running is a no-op. Hook failures are logged and never abort the
    /// sweep.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(network = %self.config.id, "network starting");
        for (id, component) in self.node_snapshot() {
            let ctx = self.node_context(&id);
            if let Err(err) = component.setup(&ctx).await {
                tracing::error!(network = %self.config.id, node = %id, error = %err, "setup failed");
            }
        }
    }

    /// Deactivate every registered node. Idempotent. Listener wiring stays
    /// in place: only `remove_node` unregisters listeners, so a stopped
    /// network can be started again.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        tracing::info!(network = %self.config.id, "network stopping");
        for (id, component) in self.node_snapshot() {
            if let Err(err) = component.teardown().await {
                tracing::error!(network = %self.config.id, node = %id, error = %err, "teardown failed");
            }
        }
    }

    fn node_snapshot(&self) -> Vec<(String, Arc<dyn Component>)> {
        self.nodes
            .lock()
            .iter()
            .map(|(id, component)| (id.clone(), Arc::clone(component)))
            .collect()
    }
}
