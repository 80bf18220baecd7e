//! Queue micro-benchmark scenarios, shared by the criterion harness.
//!
//! Each scenario moves `iters` integers through a channel and returns the
//! time it took:
//!
//! - [`ping`]: one thread, send one item then receive it back;
//! - [`stream`]: a producer thread sends, the current thread receives;
//! - [`batch`]: one thread fills `buflen` items then drains them.

use std::hint::black_box;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use lfqueue::{PtrQueue, RefQueue};

/// Capacity of bounded baselines in [`stream`].
const STREAM_CAP: usize = 1;

pub trait Channel {
    type Tx: Send;
    type Rx;

    /// Creates a channel. Bounded implementations hold at least `cap` items.
    fn pair(cap: usize) -> (Self::Tx, Self::Rx);
    fn send(tx: &Self::Tx, val: usize);
    fn try_recv(rx: &Self::Rx) -> Option<usize>;
}

pub struct RefFifo;

impl Channel for RefFifo {
    type Tx = Arc<RefQueue<usize>>;
    type Rx = Arc<RefQueue<usize>>;

    fn pair(_: usize) -> (Self::Tx, Self::Rx) {
        let q = Arc::new(RefQueue::new());
        (q.clone(), q)
    }
    fn send(tx: &Self::Tx, val: usize) {
        tx.enqueue(Arc::new(val)).expect("out of memory")
    }
    fn try_recv(rx: &Self::Rx) -> Option<usize> {
        rx.dequeue().map(|v| *v)
    }
}

pub struct PtrFifo;

impl Channel for PtrFifo {
    type Tx = Arc<PtrQueue>;
    type Rx = Arc<PtrQueue>;

    fn pair(_: usize) -> (Self::Tx, Self::Rx) {
        let q = Arc::new(PtrQueue::new());
        (q.clone(), q)
    }
    fn send(tx: &Self::Tx, val: usize) {
        tx.enqueue(std::ptr::without_provenance_mut(val))
            .expect("out of memory")
    }
    fn try_recv(rx: &Self::Rx) -> Option<usize> {
        rx.dequeue().map(|p| p.addr())
    }
}

/// Baseline: `std::sync::mpsc::sync_channel`.
pub struct Mpsc;

impl Channel for Mpsc {
    type Tx = mpsc::SyncSender<usize>;
    type Rx = mpsc::Receiver<usize>;

    fn pair(cap: usize) -> (Self::Tx, Self::Rx) {
        mpsc::sync_channel(cap)
    }
    fn send(tx: &Self::Tx, val: usize) {
        tx.send(val).expect("receiver dropped")
    }
    fn try_recv(rx: &Self::Rx) -> Option<usize> {
        rx.try_recv().ok()
    }
}

pub fn ping<C: Channel>(iters: usize) -> Duration {
    let (tx, rx) = C::pair(1);
    let now = Instant::now();
    for i in 0..iters {
        C::send(&tx, black_box(i));
        black_box(C::try_recv(&rx));
    }
    now.elapsed()
}

pub fn stream<C: Channel>(iters: usize) -> Duration {
    let (tx, rx) = C::pair(STREAM_CAP);
    let now = Instant::now();
    std::thread::scope(|cx| {
        cx.spawn(move || {
            for i in 0..iters {
                C::send(&tx, black_box(i));
            }
        });
        let mut received = 0;
        while received < iters {
            match C::try_recv(&rx) {
                Some(v) => {
                    black_box(v);
                    received += 1;
                },
                None => std::hint::spin_loop(),
            }
        }
    });
    now.elapsed()
}

pub fn batch<C: Channel>(iters: usize, buflen: usize) -> Duration {
    assert!(buflen > 0);
    let (tx, rx) = C::pair(buflen);
    let now = Instant::now();
    let rounds = std::iter::repeat_n(buflen, iters / buflen);
    for len in rounds.chain(Some(iters % buflen).filter(|&n| n > 0)) {
        for i in 0..len {
            C::send(&tx, black_box(i));
        }
        for _ in 0..len {
            black_box(C::try_recv(&rx));
        }
    }
    now.elapsed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenarios<C: Channel>() {
        ping::<C>(100);
        stream::<C>(1_000);
        batch::<C>(1_000, 64);
    }

    #[test]
    fn scenarios_complete() {
        scenarios::<RefFifo>();
        scenarios::<PtrFifo>();
        scenarios::<Mpsc>();
    }

    /// Counts sends, to check scenarios move exactly `iters` items.
    struct Counted;

    thread_local! {
        static SENT: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
    }

    impl Channel for Counted {
        type Tx = Arc<RefQueue<usize>>;
        type Rx = Arc<RefQueue<usize>>;

        fn pair(cap: usize) -> (Self::Tx, Self::Rx) {
            RefFifo::pair(cap)
        }
        fn send(tx: &Self::Tx, val: usize) {
            SENT.with(|s| s.set(s.get() + 1));
            RefFifo::send(tx, val)
        }
        fn try_recv(rx: &Self::Rx) -> Option<usize> {
            RefFifo::try_recv(rx)
        }
    }

    #[test]
    fn batch_sends_exactly_iters() {
        for (iters, buflen) in [(1_000, 64), (1_024, 64), (10, 64), (0, 16), (7, 1)] {
            SENT.with(|s| s.set(0));
            batch::<Counted>(iters, buflen);
            assert_eq!(SENT.with(|s| s.get()), iters, "iters={iters}, buflen={buflen}");
        }
    }

    #[test]
    fn batch_drains_every_round() {
        let (tx, rx) = RefFifo::pair(0);
        for _ in 0..3 {
            for i in 0..10 {
                RefFifo::send(&tx, i);
            }
            assert_eq!(
                std::iter::from_fn(|| RefFifo::try_recv(&rx)).collect::<Vec<_>>(),
                (0..10).collect::<Vec<_>>()
            );
        }
        assert!(rx.is_empty());
    }
}
