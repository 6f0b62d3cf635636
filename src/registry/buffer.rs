//! Per-registration message buffer
//!
//! Events arrive from a registration's reader task and leave through the poll
//! endpoint. The buffer supports one concurrent appender per upstream
//! connection plus one concurrent drainer: append pushes under a short-lived
//! mutex, drain swaps the whole queue out and returns it. An append is either
//! fully reflected in a drain's result or fully deferred to the next drain,
//! and no event is ever returned by more than one drain.
//!
//! Growth is bounded. When the buffer is full the oldest event is dropped to
//! make room and the drop is counted, so an abandoned poller costs a fixed
//! amount of memory instead of growing without limit.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use super::event::ChatEvent;

/// Default maximum number of buffered events per registration
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

#[derive(Debug, Default)]
struct BufferInner {
    queue: VecDeque<ChatEvent>,
    /// Drops since the last drain, used to warn once per poll cycle
    dropped_since_drain: u64,
}

/// Bounded, drain-once event buffer
#[derive(Debug)]
pub struct MessageBuffer {
    capacity: usize,
    inner: Mutex<BufferInner>,
    /// Total events dropped over the buffer's lifetime
    dropped: AtomicU64,
}

impl MessageBuffer {
    /// Create a buffer with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    /// Create a buffer holding at most `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(BufferInner::default()),
            dropped: AtomicU64::new(0),
        }
    }

    /// Append one event to the tail
    ///
    /// Never blocks beyond the internal mutex. Returns `true` if the event
    /// was stored without evicting anything, `false` if the oldest event was
    /// dropped to make room.
    pub fn append(&self, event: ChatEvent) -> bool {
        let mut inner = self.lock();

        let mut evicted = false;
        while inner.queue.len() >= self.capacity {
            inner.queue.pop_front();
            evicted = true;
        }

        if evicted {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            if inner.dropped_since_drain == 0 {
                tracing::warn!(
                    capacity = self.capacity,
                    "Buffer full, dropping oldest events until next drain"
                );
            }
            inner.dropped_since_drain += 1;
        }

        inner.queue.push_back(event);
        !evicted
    }

    /// Atomically take the entire current contents, leaving the buffer empty
    pub fn drain(&self) -> Vec<ChatEvent> {
        let mut inner = self.lock();
        inner.dropped_since_drain = 0;
        Vec::from(std::mem::take(&mut inner.queue))
    }

    /// Discard all buffered events without returning them
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.queue.clear();
        inner.dropped_since_drain = 0;
    }

    /// Number of events currently buffered
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Whether the buffer is currently empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of events this buffer will hold
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total events dropped to overflow over the buffer's lifetime
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BufferInner> {
        // A panic while the lock is held cannot leave the queue in a torn
        // state, so a poisoned mutex is still safe to use.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new()
    }
}
