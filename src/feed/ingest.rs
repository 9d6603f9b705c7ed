//! Shared staging queue between the transport task and the feed poller.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

use super::MAX_NUM_MESSAGES;

#[derive(Debug, Default)]
struct IngestState {
    lines: VecDeque<String>,
    closed: bool,
    dropped: u64,
}

/// Bounded FIFO of already formatted lines.
///
/// Cloning the buffer clones the handle; all clones share the same queue.
/// `append` never blocks on the consumer and never fails. When the queue
/// grows past its capacity the oldest lines are evicted.
///
/// After [`close`](Self::close) every further `append` is a no-op, so
/// transport callbacks that fire during teardown cannot touch a screen that
/// is going away.
#[derive(Debug, Clone)]
pub struct IngestBuffer {
    inner: Arc<Mutex<IngestState>>,
    capacity: usize,
}

impl Default for IngestBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_NUM_MESSAGES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(IngestState {
                lines: VecDeque::with_capacity(capacity + 1),
                ..Default::default()
            })),
            capacity,
        }
    }

    // A panic while holding the lock cannot leave the deque half-modified,
    // so a poisoned lock is recovered instead of propagated.
    fn lock(&self) -> MutexGuard<'_, IngestState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends a line at the tail, evicting from the head while over capacity.
    pub fn append(&self, line: impl Into<String>) {
        let mut state = self.lock();
        if state.closed {
            debug!("Ingest buffer closed, discarding line");
            return;
        }

        state.lines.push_back(line.into());
        while state.lines.len() > self.capacity {
            state.lines.pop_front();
            state.dropped += 1;
            trace!("Ingest buffer full, evicted oldest line");
        }
    }

    /// Removes and returns every buffered line in arrival order.
    pub fn drain_all(&self) -> Vec<String> {
        let mut state = self.lock();
        state.lines.drain(..).collect()
    }

    /// Stops accepting lines and discards whatever is still buffered.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.lines.clear();
        debug!("Ingest buffer closed");
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().lines.is_empty()
    }

    /// Number of lines evicted by the drop-oldest policy so far.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn drain_returns_lines_in_arrival_order() {
        let buffer = IngestBuffer::new();
        buffer.append("first");
        buffer.append("second");
        buffer.append("third");

        assert_eq!(buffer.drain_all(), vec!["first", "second", "third"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn second_drain_without_append_is_empty() {
        let buffer = IngestBuffer::new();
        buffer.append("only");

        assert_eq!(buffer.drain_all().len(), 1);
        assert!(buffer.drain_all().is_empty());
        assert!(buffer.drain_all().is_empty());
    }

    #[test]
    fn overflow_keeps_the_most_recent_lines() {
        let buffer = IngestBuffer::new();
        for i in 0..120 {
            buffer.append(format!("line {i}"));
            assert!(buffer.len() <= MAX_NUM_MESSAGES);
        }

        let drained = buffer.drain_all();
        let expected: Vec<String> = (70..120).map(|i| format!("line {i}")).collect();
        assert_eq!(drained, expected);
        assert_eq!(buffer.dropped(), 70);
    }

    #[test]
    fn closed_buffer_ignores_appends() {
        let buffer = IngestBuffer::new();
        buffer.append("before");
        buffer.close();
        buffer.append("after");

        assert!(buffer.is_closed());
        assert!(buffer.drain_all().is_empty());
    }

    #[test]
    fn clones_share_the_same_queue() {
        let producer = IngestBuffer::new();
        let consumer = producer.clone();
        producer.append("shared");

        assert_eq!(consumer.drain_all(), vec!["shared"]);
        assert!(producer.is_empty());
    }

    #[test]
    fn concurrent_producers_never_exceed_capacity() {
        let buffer = IngestBuffer::new();
        let handles: Vec<_> = (0..4)
            .map(|producer| {
                let buffer = buffer.clone();
                thread::spawn(move || {
                    for i in 0..200 {
                        buffer.append(format!("{producer}-{i}"));
                    }
                })
            })
            .collect();

        let mut drained = Vec::new();
        for _ in 0..20 {
            let batch = buffer.drain_all();
            assert!(batch.len() <= MAX_NUM_MESSAGES);
            drained.extend(batch);
        }
        for handle in handles {
            handle.join().unwrap();
        }
        drained.extend(buffer.drain_all());

        // Lines of a single producer keep their relative order.
        for producer in 0..4 {
            let prefix = format!("{producer}-");
            let seq: Vec<usize> = drained
                .iter()
                .filter_map(|line| line.strip_prefix(&prefix))
                .map(|n| n.parse().unwrap())
                .collect();
            assert!(seq.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
