use std::time::Duration;

/// Bounds and timing knobs for the message bus.
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Maximum entries retained per data queue; older entries are evicted.
    pub queue_maxlen: usize,
    /// Maximum entries retained per trigger stream.
    pub stream_maxlen: usize,
    /// How long one blocking stream read waits before re-polling.
    pub block: Duration,
}

impl BusConfig {
    pub const DEFAULT_QUEUE_MAXLEN: usize = 100;
    pub const DEFAULT_STREAM_MAXLEN: usize = 100;
    pub const DEFAULT_BLOCK: Duration = Duration::from_millis(60);

    #[must_use]
    pub fn with_queue_maxlen(mut self, maxlen: usize) -> Self {
        self.queue_maxlen = maxlen.max(1);
        self
    }

    #[must_use]
    pub fn with_stream_maxlen(mut self, maxlen: usize) -> Self {
        self.stream_maxlen = maxlen.max(1);
        self
    }

    #[must_use]
    pub fn with_block(mut self, block: Duration) -> Self {
        self.block = block;
        self
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_maxlen: Self::DEFAULT_QUEUE_MAXLEN,
            stream_maxlen: Self::DEFAULT_STREAM_MAXLEN,
            block: Self::DEFAULT_BLOCK,
        }
    }
}
