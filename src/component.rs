//! The component abstraction: a unit with `setup`/`process`/`teardown`
//! lifecycle hooks, driven by bus triggers.

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::context::Context;
use crate::store::StoreError;

/// Failures raised by component lifecycle hooks.
///
/// Hook failures are contained to the failing node: the listener loop and
/// the network's lifecycle sweeps log them and carry on.
#[derive(Debug, Error, Diagnostic)]
pub enum ComponentError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    /// A payload did not have the shape the component expected.
    #[error("malformed payload: {0}")]
    #[diagnostic(code(msgflow::component::payload))]
    Payload(#[from] serde_json::Error),

    #[error("component failure: {0}")]
    #[diagnostic(code(msgflow::component::failed))]
    Failed(String),
}

impl ComponentError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A polymorphic unit of the network.
///
/// Concrete components override any subset of the hooks; every default is a
/// traced no-op. `process` runs on each trigger and should be
/// level-triggered: check the input queues for available data instead of
/// assuming the wake carried anything specific.
#[async_trait]
pub trait Component: Send + Sync {
    /// Unique id within the network.
    fn id(&self) -> &str;

    /// Invoked when the component becomes active: on `Network::start`, or
    /// immediately on registration if the network is already running.
    async fn setup(&self, _ctx: &Context) -> Result<(), ComponentError> {
        tracing::debug!(node = %self.id(), "setup");
        Ok(())
    }

    /// Invoked once per trigger on this node's event stream.
    async fn process(&self, _ctx: &Context) -> Result<(), ComponentError> {
        tracing::debug!(node = %self.id(), "process");
        Ok(())
    }

    /// Invoked when the component is deactivated: on `Network::stop` or on
    /// removal from a running network.
    async fn teardown(&self) -> Result<(), ComponentError> {
        tracing::debug!(node = %self.id(), "teardown");
        Ok(())
    }
}

/// The `"default"` component: all hooks are the trait's traced no-ops.
///
/// Instantiated for graph nodes whose type has no registered constructor.
pub struct NoopComponent {
    id: String,
}

impl NoopComponent {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// A component with a generated (v4 UUID) id.
    pub fn with_generated_id() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

#[async_trait]
impl Component for NoopComponent {
    fn id(&self) -> &str {
        &self.id
    }
}
