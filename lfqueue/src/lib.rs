//! A lock-free multi-producer multi-consumer FIFO queue.
//!
//! [`QueueHead`] implements the queue once, generically over its items.
//! [`RefQueue`] carries reference-counted handles and [`PtrQueue`] carries
//! opaque pointers; both are thin wrappers around the same algorithm.
//!
//! Empty queues are reported with `None`, nothing ever blocks. Callers that
//! need to wait build that on top.

pub mod diag;

mod error;
pub use error::AllocError;

mod head;
pub use head::{Drain, QueueHead};

mod node;
pub use node::{LinkLayout, Node, NodeShape};

mod pointer;
pub use pointer::{PointerNode, PtrQueue, RawItem};

mod reference;
pub use reference::RefQueue;
