//! Sequential node walker for test assertions.

use std::sync::atomic::{AtomicPtr, Ordering};

/// Counts the nodes reachable from `first` by following the link stored
/// `link_offset` bytes into each node. A null `first` yields zero.
///
/// The walk takes no guard and performs no synchronization; it only reads
/// through the links. Since it never looks at items, one routine serves
/// every node type, given its [`LinkLayout::LINK_OFFSET`].
///
/// # Safety
///
/// Every node on the chain must stay alive and unmodified for the duration
/// of the walk, i.e. no enqueue or dequeue may run concurrently, and
/// `link_offset` must be the link offset of the node type the chain is built
/// from. A cyclic chain never terminates.
///
/// [`LinkLayout::LINK_OFFSET`]: crate::LinkLayout::LINK_OFFSET
pub unsafe fn count_nodes(first: *const u8, link_offset: usize) -> usize {
    let mut count = 0;
    let mut cur = first;
    while !cur.is_null() {
        count += 1;
        // Links have the layout of `AtomicPtr<Node<_>>` whatever the item is.
        let link = unsafe { &*cur.byte_add(link_offset).cast::<AtomicPtr<u8>>() };
        cur = link.load(Ordering::Relaxed).cast_const();
    }
    count
}
