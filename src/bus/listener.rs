//! The per-key listener loop that turns stream entries into handler calls.

use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::store::{EntryId, Store};
use crate::types::Trigger;

use super::config::BusConfig;

/// Opaque failure returned by a trigger handler.
///
/// Handler errors are a fault-isolation boundary: the loop logs them and
/// moves on; they never stop the loop, never prevent entry deletion, and
/// never propagate to other keys.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Consumer side of a trigger stream.
///
/// Handlers are expected to be level-triggered: re-check available data
/// rather than trust the triggering payload, so a missed or duplicated wake
/// is harmless.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_trigger(&self, trigger: Trigger) -> Result<(), HandlerError>;
}

/// Pause after a failed stream read before retrying, so a dead store does
/// not spin the loop.
const READ_RETRY_BACKOFF: Duration = Duration::from_millis(250);

pub(super) async fn run(
    store: Arc<dyn Store>,
    key: String,
    config: BusConfig,
    handler: Arc<dyn EventHandler>,
    mut shutdown: oneshot::Receiver<()>,
) {
    tracing::debug!(key = %key, "listener started");

    // Check-on-start: drain whatever accumulated before this listener
    // existed. Without it, data whose trigger fired earlier would stay
    // stranded until the next unrelated wake.
    dispatch(&handler, &key, Trigger::startup()).await;

    let mut cursor: Option<EntryId> = None;
    loop {
        let batch = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            read = store.stream_read(&key, cursor, config.block) => match read {
                Ok(batch) => batch,
                Err(err) => {
                    tracing::error!(key = %key, error = %err, "trigger stream read failed");
                    tokio::time::sleep(READ_RETRY_BACKOFF).await;
                    continue;
                }
            },
        };

        if batch.is_empty() {
            continue;
        }
        if let Some(last) = batch.last() {
            cursor = Some(last.id);
        }

        // Handlers for independent entries within one batch run concurrently;
        // there is no ordering guarantee between them. Each entry is deleted
        // after its handler completes, failed or not.
        join_all(batch.iter().map(|entry| {
            let store = Arc::clone(&store);
            let handler = Arc::clone(&handler);
            let key = key.as_str();
            async move {
                dispatch(&handler, key, Trigger::from_value(&entry.payload)).await;
                if let Err(err) = store.stream_delete(key, entry.id).await {
                    tracing::warn!(key = %key, id = %entry.id, error = %err, "trigger delete failed");
                }
            }
        }))
        .await;
    }

    tracing::debug!(key = %key, "listener stopped");
}

async fn dispatch(handler: &Arc<dyn EventHandler>, key: &str, trigger: Trigger) {
    if let Err(err) = handler.on_trigger(trigger).await {
        tracing::error!(key = %key, error = %err, "trigger handler failed");
    }
}
