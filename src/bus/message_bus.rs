use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::store::{MemoryStore, Store, StoreError};
use crate::types::Trigger;

use super::config::BusConfig;
use super::listener::{self, EventHandler};

struct ListenerHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Bounded queues plus trigger streams over a shared [`Store`].
///
/// All methods take the bus key string; the bus has no knowledge of
/// components or graphs. Store failures surface from the individual call and
/// are not retried here.
pub struct MessageBus {
    store: Arc<dyn Store>,
    config: BusConfig,
    listeners: Mutex<FxHashMap<String, ListenerHandle>>,
}

impl MessageBus {
    pub fn new(store: Arc<dyn Store>, config: BusConfig) -> Self {
        Self {
            store,
            config,
            listeners: Mutex::new(FxHashMap::default()),
        }
    }

    /// Bus backed by a fresh [`MemoryStore`].
    pub fn in_memory(config: BusConfig) -> Self {
        Self::new(Arc::new(MemoryStore::new()), config)
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Append `value` to the data queue at `key`. Insertion beyond the
    /// configured capacity silently evicts the oldest entries; the producer
    /// never blocks and never fails on overflow.
    pub async fn send_data(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.store
            .queue_push(key, vec![value], self.config.queue_maxlen)
            .await
    }

    /// Atomically remove and return the oldest entry, if any.
    pub async fn get_data(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let mut values = self.store.queue_pop(key, 1).await?;
        Ok(if values.is_empty() {
            None
        } else {
            Some(values.remove(0))
        })
    }

    /// Atomically remove and return up to `count` oldest entries,
    /// oldest-first. Returns what is available without blocking.
    pub async fn get_data_many(&self, key: &str, count: usize) -> Result<Vec<Value>, StoreError> {
        self.store.queue_pop(key, count).await
    }

    /// True iff at least `count` entries currently reside in the queue.
    pub async fn has_data(&self, key: &str, count: usize) -> Result<bool, StoreError> {
        Ok(self.store.queue_len(key).await? >= count.max(1))
    }

    /// Publish a trigger on the stream at `key`.
    pub async fn send_event(&self, key: &str, trigger: Trigger) -> Result<(), StoreError> {
        self.store
            .stream_append(key, trigger.into_value(), self.config.stream_maxlen)
            .await?;
        Ok(())
    }

    /// Register the single active consumer for `key`.
    ///
    /// Any existing listener on the same key is cancelled (and awaited) first,
    /// so exactly one consumer is active once this returns and only the new
    /// handler is ever invoked afterwards. The listener invokes the handler
    /// once per stream entry, deletes the entry after the handler completes
    /// (successful or not), and keeps running across handler failures.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn add_listener(&self, key: &str, handler: Arc<dyn EventHandler>) {
        self.remove_listener(key).await;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(listener::run(
            Arc::clone(&self.store),
            key.to_string(),
            self.config.clone(),
            handler,
            shutdown_rx,
        ));
        self.listeners.lock().insert(
            key.to_string(),
            ListenerHandle {
                shutdown: shutdown_tx,
                task,
            },
        );
    }

    /// Stop and deregister the listener for `key`, waiting for its loop to
    /// wind down. Returns false when no listener was registered.
    pub async fn remove_listener(&self, key: &str) -> bool {
        let Some(handle) = self.listeners.lock().remove(key) else {
            return false;
        };
        let _ = handle.shutdown.send(());
        if let Err(err) = handle.task.await {
            if !err.is_cancelled() {
                tracing::warn!(key = %key, error = %err, "listener task aborted");
            }
        }
        true
    }

    /// True iff a listener is currently registered for `key`.
    pub fn has_listeners(&self, key: &str) -> bool {
        self.listeners.lock().contains_key(key)
    }
}

impl Drop for MessageBus {
    fn drop(&mut self) {
        let mut listeners = self.listeners.lock();
        for (_, handle) in listeners.drain() {
            let _ = handle.shutdown.send(());
            handle.task.abort();
        }
    }
}
