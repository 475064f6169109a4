//! In-process store backed by mutex-guarded tables.
//!
//! Atomicity falls out of performing every multi-step mutation under a single
//! lock acquisition. Blocking stream reads park on a per-key
//! [`Notify`](tokio::sync::Notify) that appends fire.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{timeout, Instant};

use super::{EntryId, Store, StoreError, StreamEntry};

#[derive(Default)]
struct StreamShard {
    entries: VecDeque<StreamEntry>,
    last_millis: i64,
    next_seq: u64,
    notify: Arc<Notify>,
}

impl StreamShard {
    fn pending(&self, after: Option<EntryId>) -> Vec<StreamEntry> {
        self.entries
            .iter()
            .filter(|entry| after.map_or(true, |cursor| entry.id > cursor))
            .cloned()
            .collect()
    }
}

/// In-memory [`Store`] implementation.
///
/// Suitable for tests and single-process deployments; all operations are
/// infallible.
#[derive(Default)]
pub struct MemoryStore {
    queues: Mutex<FxHashMap<String, VecDeque<Value>>>,
    streams: Mutex<FxHashMap<String, StreamShard>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn shard_notify(&self, key: &str) -> Arc<Notify> {
        let mut streams = self.streams.lock();
        Arc::clone(&streams.entry(key.to_string()).or_default().notify)
    }

    fn take_pending(&self, key: &str, after: Option<EntryId>) -> Vec<StreamEntry> {
        let mut streams = self.streams.lock();
        streams
            .entry(key.to_string())
            .or_default()
            .pending(after)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn queue_push(
        &self,
        key: &str,
        values: Vec<Value>,
        maxlen: usize,
    ) -> Result<(), StoreError> {
        let mut queues = self.queues.lock();
        let queue = queues.entry(key.to_string()).or_default();
        queue.extend(values);
        // Drop-oldest backpressure: the producer never blocks or fails.
        while queue.len() > maxlen {
            queue.pop_front();
        }
        Ok(())
    }

    async fn queue_pop(&self, key: &str, count: usize) -> Result<Vec<Value>, StoreError> {
        let mut queues = self.queues.lock();
        let Some(queue) = queues.get_mut(key) else {
            return Ok(Vec::new());
        };
        let take = count.min(queue.len());
        Ok(queue.drain(..take).collect())
    }

    async fn queue_len(&self, key: &str) -> Result<usize, StoreError> {
        Ok(self.queues.lock().get(key).map_or(0, VecDeque::len))
    }

    async fn stream_append(
        &self,
        key: &str,
        payload: Value,
        maxlen: usize,
    ) -> Result<EntryId, StoreError> {
        let notify;
        let id;
        {
            let mut streams = self.streams.lock();
            let shard = streams.entry(key.to_string()).or_default();
            // Ids must stay monotone even if the wall clock steps backwards.
            let millis = Utc::now().timestamp_millis().max(shard.last_millis);
            shard.last_millis = millis;
            id = EntryId::new(millis, shard.next_seq);
            shard.next_seq += 1;
            shard.entries.push_back(StreamEntry {
                id,
                payload,
            });
            while shard.entries.len() > maxlen {
                shard.entries.pop_front();
            }
            notify = Arc::clone(&shard.notify);
        }
        notify.notify_waiters();
        Ok(id)
    }

    async fn stream_read(
        &self,
        key: &str,
        after: Option<EntryId>,
        block: Duration,
    ) -> Result<Vec<StreamEntry>, StoreError> {
        let deadline = Instant::now() + block;
        loop {
            let batch = self.take_pending(key, after);
            if !batch.is_empty() {
                return Ok(batch);
            }

            let notify = self.shard_notify(key);
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            // An append may have landed between the pending check and waiter
            // registration; re-check before parking.
            let batch = self.take_pending(key, after);
            if !batch.is_empty() {
                return Ok(batch);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || timeout(remaining, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn stream_delete(&self, key: &str, id: EntryId) -> Result<(), StoreError> {
        let mut streams = self.streams.lock();
        if let Some(shard) = streams.get_mut(key) {
            shard.entries.retain(|entry| entry.id != id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn queue_trim_keeps_newest() {
        let store = MemoryStore::new();
        for i in 0..8 {
            store
                .queue_push("q", vec![json!(i)], 5)
                .await
                .unwrap();
        }
        assert_eq!(store.queue_len("q").await.unwrap(), 5);
        let popped = store.queue_pop("q", 5).await.unwrap();
        assert_eq!(popped, vec![json!(3), json!(4), json!(5), json!(6), json!(7)]);
    }

    #[tokio::test]
    async fn stream_trim_keeps_newest() {
        let store = MemoryStore::new();
        for i in 0..8 {
            store.stream_append("s", json!(i), 5).await.unwrap();
        }
        let batch = store
            .stream_read("s", None, Duration::from_millis(10))
            .await
            .unwrap();
        let payloads: Vec<_> = batch.iter().map(|entry| entry.payload.clone()).collect();
        assert_eq!(
            payloads,
            vec![json!(3), json!(4), json!(5), json!(6), json!(7)],
            "overflow evicts the oldest stream entries"
        );
    }

    #[tokio::test]
    async fn stream_ids_are_strictly_increasing() {
        let store = MemoryStore::new();
        let a = store.stream_append("s", json!(1), 10).await.unwrap();
        let b = store.stream_append("s", json!(2), 10).await.unwrap();
        let c = store.stream_append("s", json!(3), 10).await.unwrap();
        assert!(a < b && b < c);
    }

    #[tokio::test]
    async fn stream_read_respects_cursor() {
        let store = MemoryStore::new();
        let first = store.stream_append("s", json!("one"), 10).await.unwrap();
        store.stream_append("s", json!("two"), 10).await.unwrap();

        let all = store
            .stream_read("s", None, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let newer = store
            .stream_read("s", Some(first), Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].payload, json!("two"));
    }

    #[tokio::test]
    async fn stream_read_times_out_empty() {
        let store = MemoryStore::new();
        let batch = store
            .stream_read("empty", None, Duration::from_millis(10))
            .await
            .unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn stream_read_wakes_on_append() {
        let store = Arc::new(MemoryStore::new());
        let reader = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .stream_read("s", None, Duration::from_secs(5))
                    .await
                    .unwrap()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.stream_append("s", json!("wake"), 10).await.unwrap();
        let batch = reader.await.unwrap();
        assert_eq!(batch.len(), 1);
    }
}
