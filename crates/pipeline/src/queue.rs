//! Bounded destination queue

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Fixed-capacity FIFO shared by the router (producer) and dispatch workers
/// (consumers)
///
/// Push prepends and pop drains from the opposite end, so entries come out
/// in the order they were successfully pushed. A push at capacity returns
/// `false` and stores nothing - it never blocks and never evicts older
/// entries. Capacity enforcement and both operations are O(1).
///
/// Safe for any number of concurrent pushers and poppers; each operation
/// takes the internal lock briefly.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    inner: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Create a queue with a fixed capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Push an item to the front.
    ///
    /// Returns `false` iff the queue is at capacity; the item is then not
    /// stored and the caller must treat it as dropped.
    pub fn push(&self, item: T) -> bool {
        let mut inner = self.inner.lock();
        if inner.len() >= self.capacity {
            return false;
        }
        inner.push_front(item);
        true
    }

    /// Pop the oldest item still present, from the tail.
    pub fn pop(&self) -> Option<T> {
        self.inner.lock().pop_back()
    }

    /// Pop up to `max` of the oldest items, oldest first.
    pub fn pop_batch(&self, max: usize) -> Vec<T> {
        let mut inner = self.inner.lock();
        let count = max.min(inner.len());
        let mut batch = Vec::with_capacity(count);
        for _ in 0..count {
            match inner.pop_back() {
                Some(item) => batch.push(item),
                None => break,
            }
        }
        batch
    }

    /// Current number of queued items
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// True if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Fixed capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
