use std::ffi::c_void;
use std::fmt;

use crate::error::AllocError;
use crate::head::QueueHead;
use crate::node::{LinkLayout, Node};

/// An address carried through [`PtrQueue`]. It is never dereferenced.
///
/// Laid out exactly as `*mut c_void`, so a [`PointerNode`] is a link
/// followed by one pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct RawItem(pub *mut c_void);

// SAFETY: The queue only moves the address around, it never accesses the
// pointee.
unsafe impl Send for RawItem {}

/// A queue of opaque pointers.
///
/// Items are plain addresses: the queue never reads, retains or frees what
/// they point to, and dropping a queue that still holds items only frees
/// its nodes. The null pointer is a valid item.
pub struct PtrQueue(QueueHead<RawItem>);

/// The node type allocated by [`PtrQueue`].
pub type PointerNode = Node<RawItem>;

impl PtrQueue {
    pub fn new() -> Self {
        Self(QueueHead::init())
    }

    /// Destroys an empty queue. See [`QueueHead::release`].
    pub fn release(self) {
        self.0.release()
    }

    pub fn enqueue(&self, item: *mut c_void) -> Result<(), AllocError<*mut c_void>> {
        self.0
            .enqueue(RawItem(item))
            .map_err(|AllocError(RawItem(item))| AllocError(item))
    }

    pub fn dequeue(&self) -> Option<*mut c_void> {
        self.0.dequeue().map(|RawItem(item)| item)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn drain(&self) -> impl Iterator<Item = *mut c_void> + '_ {
        self.0.drain().map(|RawItem(item)| item)
    }

    pub fn node_count(&mut self) -> usize {
        self.0.node_count()
    }

    pub const fn node_size() -> usize {
        PointerNode::SIZE
    }

    pub const fn link_offset() -> usize {
        PointerNode::LINK_OFFSET
    }
}

impl Default for PtrQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PtrQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PtrQueue").field(&self.0).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::ptr;

    fn addr(i: usize) -> *mut c_void {
        ptr::without_provenance_mut(i << 4)
    }

    #[test]
    fn sequential_fifo() {
        let q = PtrQueue::new();
        for i in 1..=3 {
            q.enqueue(addr(i)).unwrap();
        }
        assert_eq!(q.len(), 3);
        assert_eq!(q.dequeue(), Some(addr(1)));
        assert_eq!(q.dequeue(), Some(addr(2)));
        assert_eq!(q.dequeue(), Some(addr(3)));
        assert_eq!(q.dequeue(), None);
        q.release();
    }

    #[test]
    fn null_is_an_item() {
        let mut q = PtrQueue::new();
        q.enqueue(ptr::null_mut()).unwrap();
        assert_eq!(q.len(), 1);
        assert_eq!(q.node_count(), 1);
        assert_eq!(q.dequeue(), Some(ptr::null_mut()));
        assert_eq!(q.dequeue(), None);
        q.release();
    }

    #[test]
    fn pointee_untouched() {
        let mut values = (0..4u64).collect::<Vec<_>>();
        let q = PtrQueue::default();
        for v in values.iter_mut() {
            q.enqueue((v as *mut u64).cast()).unwrap();
        }
        // Dropping a non-empty queue frees only its nodes.
        drop(q);
        assert_eq!(values, [0, 1, 2, 3]);
    }

    #[test]
    fn node_shape() {
        assert_eq!(PtrQueue::node_size(), PointerNode::SIZE);
        assert_eq!(PtrQueue::link_offset(), PointerNode::LINK_OFFSET);
        assert_eq!(PtrQueue::node_size(), 2 * size_of::<*mut c_void>());
        assert_eq!(PtrQueue::link_offset(), 0);
        assert_eq!(size_of::<RawItem>(), size_of::<*mut c_void>());
        assert_eq!(
            std::mem::offset_of!(PointerNode, item),
            size_of::<*mut c_void>()
        );
    }

    #[test]
    fn concurrent_completeness() {
        const PRODUCERS: usize = 3;
        const CONSUMERS: usize = 3;
        const ITEMS: usize = 5_000;

        let mut q = PtrQueue::new();
        let taken = std::thread::scope(|cx| {
            let q = &q;
            for p in 0..PRODUCERS {
                cx.spawn(move || {
                    for i in 0..ITEMS {
                        q.enqueue(addr(p * ITEMS + i + 1)).unwrap();
                    }
                });
            }
            let consumers = (0..CONSUMERS)
                .map(|_| {
                    cx.spawn(move || {
                        let mut r = vec![];
                        let mut idle = 0;
                        // Producers finish long before consumers give up.
                        while idle < 100_000 {
                            match q.dequeue() {
                                Some(p) => {
                                    r.push(p.addr());
                                    idle = 0;
                                },
                                None => idle += 1,
                            }
                        }
                        r
                    })
                })
                .collect::<Vec<_>>();
            consumers
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect::<Vec<_>>()
        });
        let remaining = q.drain().map(|p| p.addr()).collect::<Vec<_>>();
        let all = taken.into_iter().chain(remaining).collect::<Vec<_>>();
        assert_eq!(all.len(), PRODUCERS * ITEMS);
        let unique = all.iter().copied().collect::<HashSet<_>>();
        assert_eq!(unique.len(), PRODUCERS * ITEMS);
        assert_eq!(q.len(), 0);
        assert_eq!(q.node_count(), 0);
        q.release();
    }
}
