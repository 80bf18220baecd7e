use std::alloc::Layout;
use std::mem::{MaybeUninit, offset_of};
use std::ptr::{self, NonNull};
use std::sync::atomic::AtomicPtr;

/// A link cell of the queue.
///
/// The first node of every list is a sentinel whose `item` is vacant. All
/// other linked nodes hold an initialized item until it is moved out by a
/// successful dequeue, at which point the node becomes the new sentinel.
#[repr(C)]
pub struct Node<T> {
    pub(crate) next: AtomicPtr<Node<T>>,
    pub(crate) item: MaybeUninit<T>,
}

/// Static shape of a node type, used to walk lists without knowing the item
/// type.
pub trait LinkLayout {
    /// Total size of one node in bytes.
    const SIZE: usize;
    /// Byte offset of the `next` link inside the node.
    const LINK_OFFSET: usize;

    fn shape() -> NodeShape {
        NodeShape {
            size: Self::SIZE,
            link_offset: Self::LINK_OFFSET,
        }
    }
}

impl<T> LinkLayout for Node<T> {
    const SIZE: usize = size_of::<Self>();
    const LINK_OFFSET: usize = offset_of!(Self, next);
}

/// Runtime copy of [`LinkLayout`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeShape {
    pub size: usize,
    pub link_offset: usize,
}

impl<T> Node<T> {
    /// Allocates the vacant sentinel node.
    ///
    /// Aborts through [`handle_alloc_error`](std::alloc::handle_alloc_error)
    /// on allocation failure.
    pub(crate) fn sentinel() -> NonNull<Self> {
        let layout = Layout::new::<Self>();
        let node = alloc::<Self>().unwrap_or_else(|| std::alloc::handle_alloc_error(layout));
        unsafe {
            node.write(Self {
                next: AtomicPtr::new(ptr::null_mut()),
                item: MaybeUninit::uninit(),
            })
        };
        node
    }

    /// Allocates an unlinked node holding `item`, handing the item back if
    /// the allocator refuses.
    pub(crate) fn try_new(item: T) -> Result<NonNull<Self>, T> {
        let Some(node) = alloc::<Self>() else {
            return Err(item);
        };
        unsafe {
            node.write(Self {
                next: AtomicPtr::new(ptr::null_mut()),
                item: MaybeUninit::new(item),
            })
        };
        Ok(node)
    }

    /// Frees the node memory without touching the item slot.
    ///
    /// # Safety
    ///
    /// `node` must come from [`sentinel`](Self::sentinel) or
    /// [`try_new`](Self::try_new), must be unreachable from any queue, and
    /// its item must have been moved out (or never initialized).
    pub(crate) unsafe fn dealloc(node: NonNull<Self>) {
        let layout = Layout::new::<Self>();
        unsafe { std::alloc::dealloc(node.as_ptr().cast(), layout) }
    }
}

fn alloc<T>() -> Option<NonNull<T>> {
    let layout = Layout::new::<T>();
    debug_assert!(layout.size() > 0);
    NonNull::new(unsafe { std::alloc::alloc(layout) }).map(NonNull::cast)
}
