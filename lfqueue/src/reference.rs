use std::fmt;
use std::sync::Arc;

use crate::error::AllocError;
use crate::head::{Drain, QueueHead};
use crate::node::{LinkLayout, Node};

/// A queue of reference-counted handles.
///
/// Enqueueing moves one strong reference into the queue and dequeueing moves
/// it back out, so the strong count of an object is the same before and
/// after it travels through the queue.
pub struct RefQueue<T>(QueueHead<Arc<T>>);

impl<T> RefQueue<T> {
    pub fn new() -> Self {
        Self(QueueHead::init())
    }

    /// Destroys an empty queue. See [`QueueHead::release`].
    pub fn release(self) {
        self.0.release()
    }

    pub fn enqueue(&self, item: Arc<T>) -> Result<(), AllocError<Arc<T>>> {
        self.0.enqueue(item)
    }

    pub fn dequeue(&self) -> Option<Arc<T>> {
        self.0.dequeue()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn drain(&self) -> Drain<'_, Arc<T>> {
        self.0.drain()
    }

    pub fn node_count(&mut self) -> usize {
        self.0.node_count()
    }

    pub const fn node_size() -> usize {
        Node::<Arc<T>>::SIZE
    }

    pub const fn link_offset() -> usize {
        Node::<Arc<T>>::LINK_OFFSET
    }
}

impl<T> Default for RefQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for RefQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefQueue").field(&self.0).finish()
    }
}
