//! The built-in router component: fans envelope data out along graph edges.

use async_trait::async_trait;
use futures_util::future::try_join_all;
use std::sync::Arc;

use crate::component::{Component, ComponentError};
use crate::context::Context;
use crate::graph::Graph;
use crate::types::{Envelope, MsgId, PortRef, DEFAULT_FROM_PORT};

/// Consumes envelopes from its inbound aggregation port and forwards every
/// payload to the destinations wired in the graph.
///
/// The router never buffers across invocations: each trigger handles exactly
/// the envelopes available at the moment of the check, and repeated triggers
/// drain any backlog incrementally. A source port with no matching
/// connection is not an error; the payload is silently dropped.
pub struct Router {
    id: String,
    graph: Arc<Graph>,
    from_port: String,
}

impl Router {
    pub fn new(id: impl Into<String>, graph: Arc<Graph>) -> Self {
        Self {
            id: id.into(),
            graph,
            from_port: DEFAULT_FROM_PORT.to_string(),
        }
    }

    #[must_use]
    pub fn with_from_port(mut self, from_port: impl Into<String>) -> Self {
        self.from_port = from_port.into();
        self
    }

    /// The topology version this router forwards against.
    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }
}

#[async_trait]
impl Component for Router {
    fn id(&self) -> &str {
        &self.id
    }

    async fn process(&self, ctx: &Context) -> Result<(), ComponentError> {
        // Level-triggered check: spurious or coalesced wakes land here.
        if !ctx.input.has_data(self.from_port.as_str(), 1).await? {
            return Ok(());
        }
        let Some(raw) = ctx.input.get_data(self.from_port.as_str()).await? else {
            return Ok(());
        };
        let envelope: Envelope = serde_json::from_value(raw)?;

        if let Some(error) = &envelope.error {
            tracing::warn!(
                node = %envelope.node,
                error = %error,
                "error envelope received, not forwarded"
            );
            return Ok(());
        }
        let Some(data) = envelope.data else {
            return Ok(());
        };

        // Independent copies per destination, no cross-target ordering.
        let mut sends = Vec::new();
        for (port, payload) in &data {
            let source = PortRef::new(envelope.node.clone(), port.clone());
            for target in self.graph.next_ports(&source) {
                let mid = MsgId::new(
                    envelope.network.clone(),
                    target.node.clone(),
                    target.port.clone(),
                );
                sends.push(ctx.output.send_data(mid, payload.clone()));
            }
        }
        try_join_all(sends).await?;
        Ok(())
    }
}
