//! Storage abstraction underneath the message bus.
//!
//! The bus needs two primitives from its backing store: bounded FIFO queues
//! (data) and bounded append-logs with blocking reads (triggers). The
//! [`Store`] trait captures exactly those operations; every multi-step
//! mutation (push+trim, pop+trim, append+trim) must be atomic so concurrent
//! consumers never observe overlapping pops or lose entries beyond the
//! configured bound.
//!
//! [`MemoryStore`] is the in-process implementation used by default and in
//! tests. Production deployments substitute a networked store behind the same
//! trait.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Identifier of one trigger-stream entry.
///
/// Millisecond timestamp plus a per-key sequence number; totally ordered, so
/// a reader can resume from the last id it has seen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryId {
    pub millis: i64,
    pub seq: u64,
}

impl EntryId {
    pub fn new(millis: i64, seq: u64) -> Self {
        Self { millis, seq }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

/// One entry of a trigger stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamEntry {
    pub id: EntryId,
    pub payload: Value,
}

/// Failures surfaced by store operations.
///
/// The in-memory store is infallible; networked backends surface
/// connectivity and protocol failures through these variants. The bus never
/// retries on its own; store failures propagate to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    #[diagnostic(
        code(msgflow::store::connection),
        help("Check that the backing store is reachable.")
    )]
    Connection(String),

    #[error("store protocol failure: {0}")]
    #[diagnostic(code(msgflow::store::protocol))]
    Protocol(String),
}

/// Atomic queue and stream primitives the bus is built on.
#[async_trait]
pub trait Store: Send + Sync {
    /// Append `values` to the queue, then trim to the newest `maxlen`
    /// entries, as one atomic operation. Overflow evicts the oldest entries
    /// and never fails.
    async fn queue_push(&self, key: &str, values: Vec<Value>, maxlen: usize)
        -> Result<(), StoreError>;

    /// Atomically remove and return up to `count` oldest entries, FIFO.
    async fn queue_pop(&self, key: &str, count: usize) -> Result<Vec<Value>, StoreError>;

    /// Number of entries currently in the queue.
    async fn queue_len(&self, key: &str) -> Result<usize, StoreError>;

    /// Append an entry to the stream, then trim to the newest `maxlen`
    /// entries, atomically. Returns the assigned entry id.
    async fn stream_append(
        &self,
        key: &str,
        payload: Value,
        maxlen: usize,
    ) -> Result<EntryId, StoreError>;

    /// Return every entry with an id strictly greater than `after` (all
    /// entries when `after` is `None`). If none exist yet, wait up to `block`
    /// for an arrival; an empty result means the wait timed out.
    ///
    /// The cursor parameter is what makes trigger delivery lossless between
    /// two polling windows: an entry appended while the caller was busy is
    /// picked up by the next read instead of being skipped.
    async fn stream_read(
        &self,
        key: &str,
        after: Option<EntryId>,
        block: Duration,
    ) -> Result<Vec<StreamEntry>, StoreError>;

    /// Delete one entry from the stream. Deleting an unknown id is a no-op.
    async fn stream_delete(&self, key: &str, id: EntryId) -> Result<(), StoreError>;
}
