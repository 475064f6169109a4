//! Test components and factories shared across integration tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use msgflow::component::{Component, ComponentError};
use msgflow::context::Context;
use msgflow::graph::{Graph, NodeSpec};
use msgflow::network::{ComponentFactory, NetworkError};
use msgflow::router::Router;

/// Shared lifecycle counters for one [`CountingComponent`].
#[derive(Clone, Default)]
pub struct LifecycleCounters {
    pub setups: Arc<AtomicUsize>,
    pub processes: Arc<AtomicUsize>,
    pub teardowns: Arc<AtomicUsize>,
}

impl LifecycleCounters {
    pub fn setups(&self) -> usize {
        self.setups.load(Ordering::SeqCst)
    }

    pub fn processes(&self) -> usize {
        self.processes.load(Ordering::SeqCst)
    }

    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }
}

/// Counts every lifecycle hook invocation.
pub struct CountingComponent {
    id: String,
    counters: LifecycleCounters,
}

impl CountingComponent {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            counters: LifecycleCounters::default(),
        }
    }

    pub fn counters(&self) -> LifecycleCounters {
        self.counters.clone()
    }
}

#[async_trait]
impl Component for CountingComponent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn setup(&self, _ctx: &Context) -> Result<(), ComponentError> {
        self.counters.setups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn process(&self, _ctx: &Context) -> Result<(), ComponentError> {
        self.counters.processes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn teardown(&self) -> Result<(), ComponentError> {
        self.counters.teardowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Emits one `{port: payload}` envelope towards the router on every trigger.
pub struct EmitOnProcess {
    id: String,
    port: String,
    payload: Value,
}

impl EmitOnProcess {
    pub fn new(id: impl Into<String>, port: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            port: port.into(),
            payload,
        }
    }
}

#[async_trait]
impl Component for EmitOnProcess {
    fn id(&self) -> &str {
        &self.id
    }

    async fn process(&self, ctx: &Context) -> Result<(), ComponentError> {
        let mut data = FxHashMap::default();
        data.insert(self.port.clone(), self.payload.clone());
        ctx.output.send(data).await?;
        Ok(())
    }
}

/// Drains one input port into a shared vector on every trigger.
pub struct CollectingComponent {
    id: String,
    port: String,
    seen: Arc<Mutex<Vec<Value>>>,
}

impl CollectingComponent {
    pub fn new(id: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            port: port.into(),
            seen: Arc::default(),
        }
    }

    pub fn seen(&self) -> Arc<Mutex<Vec<Value>>> {
        Arc::clone(&self.seen)
    }
}

#[async_trait]
impl Component for CollectingComponent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn process(&self, ctx: &Context) -> Result<(), ComponentError> {
        while let Some(value) = ctx.input.get_data(self.port.as_str()).await? {
            self.seen.lock().push(value);
        }
        Ok(())
    }
}

/// Fails every `process` call, counting the attempts.
pub struct FailingComponent {
    id: String,
    pub attempts: Arc<AtomicUsize>,
}

impl FailingComponent {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attempts: Arc::default(),
        }
    }
}

#[async_trait]
impl Component for FailingComponent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn process(&self, _ctx: &Context) -> Result<(), ComponentError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ComponentError::failed("always fails"))
    }
}

/// Chronological log of lifecycle transitions, `"setup:<id>"` /
/// `"teardown:<id>"`.
pub type LifecycleLog = Arc<Mutex<Vec<String>>>;

/// Forwards every hook to the wrapped component, recording setup/teardown
/// order.
pub struct Recorded {
    inner: Arc<dyn Component>,
    log: LifecycleLog,
}

impl Recorded {
    pub fn wrap(inner: Arc<dyn Component>, log: LifecycleLog) -> Arc<dyn Component> {
        Arc::new(Self { inner, log })
    }
}

#[async_trait]
impl Component for Recorded {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn setup(&self, ctx: &Context) -> Result<(), ComponentError> {
        self.log.lock().push(format!("setup:{}", self.inner.id()));
        self.inner.setup(ctx).await
    }

    async fn process(&self, ctx: &Context) -> Result<(), ComponentError> {
        self.inner.process(ctx).await
    }

    async fn teardown(&self) -> Result<(), ComponentError> {
        self.log.lock().push(format!("teardown:{}", self.inner.id()));
        self.inner.teardown().await
    }
}

/// Factory that refuses to build one node type, succeeding for everything
/// else.
pub struct BrittleFactory {
    fail_type: String,
}

impl BrittleFactory {
    pub fn failing_on(fail_type: impl Into<String>) -> Self {
        Self {
            fail_type: fail_type.into(),
        }
    }
}

impl ComponentFactory for BrittleFactory {
    fn build(&self, spec: &NodeSpec) -> Result<Arc<dyn Component>, NetworkError> {
        if spec.node_type == self.fail_type {
            return Err(NetworkError::construction(
                spec.id.clone(),
                "no constructor for this type",
            ));
        }
        Ok(Arc::new(CountingComponent::new(spec.id.clone())))
    }
}

/// Factory test double: every built component (router included) is wrapped
/// in a [`Recorded`], exposing the add/remove order of a hot reload.
#[derive(Default)]
pub struct RecordingFactory {
    pub log: LifecycleLog,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ComponentFactory for RecordingFactory {
    fn build(&self, spec: &NodeSpec) -> Result<Arc<dyn Component>, NetworkError> {
        Ok(Recorded::wrap(
            Arc::new(CountingComponent::new(spec.id.clone())),
            Arc::clone(&self.log),
        ))
    }

    fn build_router(
        &self,
        spec: &NodeSpec,
        graph: Arc<Graph>,
        from_port: &str,
    ) -> Result<Arc<dyn Component>, NetworkError> {
        Ok(Recorded::wrap(
            Arc::new(Router::new(spec.id.clone(), graph).with_from_port(from_port)),
            Arc::clone(&self.log),
        ))
    }
}
