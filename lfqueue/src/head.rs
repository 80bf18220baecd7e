use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use crossbeam_epoch::{self as epoch, Guard};
use crossbeam_utils::CachePadded;

use crate::diag;
use crate::error::AllocError;
use crate::node::{LinkLayout, Node};

/// Shared state of one lock-free FIFO queue.
///
/// This is the Michael-Scott queue: a singly linked list that always starts
/// with a vacant sentinel node. `head` points at the sentinel, whose `next`
/// is the oldest item; `tail` points at the newest node or lags it by one
/// link while an enqueue is being completed. The queue is empty iff the
/// sentinel has no successor.
///
/// Unlinked nodes are retired through the process-wide [`crossbeam_epoch`]
/// collector and only freed once no pinned thread can still observe them, so
/// a node address is never reused while a stale copy of it may take part in
/// a CAS.
pub struct QueueHead<T> {
    head: CachePadded<AtomicPtr<Node<T>>>,
    tail: CachePadded<AtomicPtr<Node<T>>>,
    len: CachePadded<AtomicUsize>,
    marker: PhantomData<T>,
}

unsafe impl<T: Send> Send for QueueHead<T> {}
unsafe impl<T: Send> Sync for QueueHead<T> {}

impl<T> QueueHead<T> {
    /// Creates an empty queue.
    pub fn init() -> Self {
        let sentinel = Node::sentinel().as_ptr();
        tracing::debug!(
            "initialized queue, node_size={}, link_offset={}",
            Node::<T>::SIZE,
            Node::<T>::LINK_OFFSET
        );
        Self {
            head: CachePadded::new(AtomicPtr::new(sentinel)),
            tail: CachePadded::new(AtomicPtr::new(sentinel)),
            len: CachePadded::new(AtomicUsize::new(0)),
            marker: PhantomData,
        }
    }

    /// Destroys the queue. It should have been drained beforehand.
    ///
    /// Releasing a non-empty queue is a caller bug, reported by an assertion
    /// in debug builds. Without assertions the remaining items are dropped.
    pub fn release(mut self) {
        debug_assert_eq!(self.node_count(), 0, "released a non-empty queue");
        tracing::debug!("released queue");
    }

    /// Appends `item` at the tail.
    pub fn enqueue(&self, item: T) -> Result<(), AllocError<T>> {
        let node = Node::try_new(item).map_err(|item| {
            tracing::warn!("failed to allocate node, size={}", Node::<T>::SIZE);
            AllocError(item)
        })?;
        // Counted before linking so a dequeue of this item never observes
        // the counter without it.
        self.len.fetch_add(1, Ordering::Relaxed);
        let guard = epoch::pin();
        self.link(node, &guard);
        Ok(())
    }

    fn link(&self, node: NonNull<Node<T>>, _guard: &Guard) {
        let node = node.as_ptr();
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            // SAFETY: `tail` is never null and the guard keeps it allocated
            // even if it has been unlinked in the meantime.
            let next_ref = unsafe { &(*tail).next };
            let next = next_ref.load(Ordering::Acquire);

            if !next.is_null() {
                // The tail lags behind; help the pending enqueue along.
                let _ = self
                    .tail
                    .compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed);
                continue;
            }

            if next_ref
                .compare_exchange(next, node, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                // Failure means another thread has already advanced it.
                let _ = self
                    .tail
                    .compare_exchange(tail, node, Ordering::Release, Ordering::Relaxed);
                return;
            }
        }
    }

    /// Removes the item at the head, or returns `None` immediately if the
    /// queue is empty.
    pub fn dequeue(&self) -> Option<T> {
        let guard = epoch::pin();
        loop {
            let head = self.head.load(Ordering::Acquire);
            let tail = self.tail.load(Ordering::Acquire);
            // SAFETY: Same as `link`, the guard keeps `head` allocated.
            let next = unsafe { (*head).next.load(Ordering::Acquire) };

            if next.is_null() {
                return None;
            }
            if head == tail {
                let _ = self
                    .tail
                    .compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed);
                continue;
            }

            if self
                .head
                .compare_exchange(head, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                // SAFETY: Only the winner of the CAS above reaches here, so
                // the item of `next` is moved out exactly once. `next` is now
                // the vacant sentinel and `head` is unreachable.
                unsafe {
                    let item = (*next).item.assume_init_read();
                    let head = NonNull::new_unchecked(head);
                    guard.defer_unchecked(move || Node::dealloc(head));
                    self.len.fetch_sub(1, Ordering::Relaxed);
                    return Some(item);
                }
            }
        }
    }

    /// Number of items in the queue, maintained by an atomic counter.
    ///
    /// Exact at quiescence; a snapshot under contention.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        let guard = epoch::pin();
        let head = self.head.load(Ordering::Acquire);
        // SAFETY: Same as `dequeue`.
        let next = unsafe { (*head).next.load(Ordering::Acquire) };
        drop(guard);
        next.is_null()
    }

    /// Returns an iterator dequeuing items until the queue is observed empty.
    pub fn drain(&self) -> Drain<'_, T> {
        Drain(self)
    }

    /// Counts linked item nodes by walking the list. Meant for assertions in
    /// tests; the `&mut` receiver guarantees no operation runs concurrently.
    pub fn node_count(&mut self) -> usize {
        let sentinel = *self.head.get_mut();
        // SAFETY: Exclusive access keeps every linked node alive and
        // unmodified, and the offset belongs to this node type.
        unsafe {
            let first = (*sentinel).next.load(Ordering::Relaxed);
            diag::count_nodes(first.cast::<u8>(), Node::<T>::LINK_OFFSET)
        }
    }
}

impl<T> Default for QueueHead<T> {
    fn default() -> Self {
        Self::init()
    }
}

impl<T> fmt::Debug for QueueHead<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueHead")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl<T> Drop for QueueHead<T> {
    fn drop(&mut self) {
        let mut cur = *self.head.get_mut();
        // The sentinel holds no item.
        let mut vacant = true;
        while let Some(node) = NonNull::new(cur) {
            // SAFETY: Exclusive access; every node after the sentinel holds
            // an initialized item. Nodes retired earlier are owned by the
            // collector and are not reachable from here.
            unsafe {
                cur = node.as_ref().next.load(Ordering::Relaxed);
                if !vacant {
                    (*node.as_ptr()).item.assume_init_drop();
                }
                Node::dealloc(node);
            }
            vacant = false;
        }
    }
}

pub struct Drain<'a, T>(&'a QueueHead<T>);

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.0.dequeue()
    }
}
