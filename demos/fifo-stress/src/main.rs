use std::ffi::c_void;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result, anyhow, ensure};
use argh::FromArgs;
use bytesize::ByteSize;
use lfqueue::{PtrQueue, RefQueue};

#[derive(Debug, FromArgs)]
/// Hammer a lock-free queue and verify nothing is lost or duplicated
#[argh(help_triggers("--help"))]
struct Args {
    /// number of producer threads
    #[argh(option, default = "4")]
    producers: usize,
    /// number of consumer threads
    #[argh(option, default = "4")]
    consumers: usize,
    /// items enqueued by each producer per round
    #[argh(option, default = "100_000")]
    items: usize,
    /// number of rounds, each run on a fresh queue
    #[argh(option, default = "1")]
    rounds: usize,
    /// item flavor, may be "ref" or "ptr"
    #[argh(option, default = "Flavor::Ref")]
    flavor: Flavor,
}

#[derive(Clone, Copy, Debug)]
enum Flavor {
    Ref,
    Ptr,
}

impl FromStr for Flavor {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ref" => Ok(Flavor::Ref),
            "ptr" => Ok(Flavor::Ptr),
            _ => Err("invalid flavor"),
        }
    }
}

/// The operations a round needs, over both queue flavors.
trait Fifo: Sync {
    const NODE_SIZE: usize;

    fn push(&self, tag: usize) -> Result<()>;
    fn pop(&self) -> Option<usize>;
    fn len(&self) -> usize;
    fn node_count(&mut self) -> usize;
    fn release(self);
}

impl Fifo for RefQueue<usize> {
    const NODE_SIZE: usize = RefQueue::<usize>::node_size();

    fn push(&self, tag: usize) -> Result<()> {
        self.enqueue(Arc::new(tag)).context("failed to enqueue")
    }
    fn pop(&self) -> Option<usize> {
        self.dequeue().map(|i| *i)
    }
    fn len(&self) -> usize {
        RefQueue::len(self)
    }
    fn node_count(&mut self) -> usize {
        RefQueue::node_count(self)
    }
    fn release(self) {
        RefQueue::release(self)
    }
}

impl Fifo for PtrQueue {
    const NODE_SIZE: usize = PtrQueue::node_size();

    fn push(&self, tag: usize) -> Result<()> {
        // Tags double as addresses, never dereferenced.
        let item = std::ptr::without_provenance_mut::<c_void>(tag);
        // The raw pointer payload is not Send/Sync; drop it so anyhow can wrap the error.
        self.enqueue(item)
            .map_err(|lfqueue::AllocError(_)| lfqueue::AllocError(()))
            .context("failed to enqueue")
    }
    fn pop(&self) -> Option<usize> {
        self.dequeue().map(|p| p.addr())
    }
    fn len(&self) -> usize {
        PtrQueue::len(self)
    }
    fn node_count(&mut self) -> usize {
        PtrQueue::node_count(self)
    }
    fn release(self) {
        PtrQueue::release(self)
    }
}

pub fn main() -> Result<()> {
    let args = argh::from_env::<Args>();
    tracing_subscriber::fmt()
        .with_thread_names(true)
        .without_time()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    ensure!(args.producers > 0, "producers must not be zero");
    ensure!(args.consumers > 0, "consumers must not be zero");

    for round in 0..args.rounds {
        tracing::info!("started round({round}), flavor={:?}", args.flavor);
        match args.flavor {
            Flavor::Ref => run_round(RefQueue::<usize>::new(), &args),
            Flavor::Ptr => run_round(PtrQueue::new(), &args),
        }
        .with_context(|| format!("round {round} failed"))?;
    }

    Ok(())
}

fn run_round<Q: Fifo>(mut queue: Q, args: &Args) -> Result<()> {
    let total = args.producers * args.items;
    let finished = AtomicBool::new(false);

    let now = Instant::now();
    let taken = std::thread::scope(|cx| -> Result<Vec<usize>> {
        let (queue, finished) = (&queue, &finished);
        let consumers = (0..args.consumers)
            .map(|c| {
                std::thread::Builder::new()
                    .name(format!("consumer-{c}"))
                    .spawn_scoped(cx, move || {
                        let mut r = vec![];
                        loop {
                            let done = finished.load(Ordering::Acquire);
                            match queue.pop() {
                                Some(tag) => r.push(tag),
                                None if done => break,
                                None => std::thread::yield_now(),
                            }
                        }
                        tracing::debug!("drained {} items", r.len());
                        r
                    })
            })
            .collect::<Result<Vec<_>, _>>();
        let producers = (0..args.producers)
            .map(|p| {
                std::thread::Builder::new()
                    .name(format!("producer-{p}"))
                    .spawn_scoped(cx, move || -> Result<()> {
                        for i in 0..args.items {
                            queue.push(p * args.items + i)?;
                            if fastrand::u8(..) == 0 {
                                std::thread::yield_now();
                            }
                        }
                        Ok(())
                    })
            })
            .collect::<Result<Vec<_>, _>>();

        let produced = producers
            .context("failed to spawn producers")
            .and_then(|hs| {
                hs.into_iter()
                    .try_for_each(|h| h.join().map_err(|_| anyhow!("producer panicked"))?)
            });
        // Consumers stop on the first empty poll that starts after this.
        finished.store(true, Ordering::Release);
        let consumers = consumers.context("failed to spawn consumers")?;
        produced?;

        let mut taken = Vec::with_capacity(total);
        for h in consumers {
            taken.extend(h.join().map_err(|_| anyhow!("consumer panicked"))?);
        }
        Ok(taken)
    })?;
    let elapsed = now.elapsed();

    ensure!(queue.len() == 0, "count is {} after drain", queue.len());
    let nodes = queue.node_count();
    ensure!(nodes == 0, "{nodes} nodes are still linked after drain");
    ensure!(taken.len() == total, "dequeued {} of {total} items", taken.len());

    let mut seen = vec![false; total];
    for tag in taken {
        let slot = seen
            .get_mut(tag)
            .ok_or_else(|| anyhow!("dequeued unknown item {tag}"))?;
        ensure!(!*slot, "dequeued item {tag} twice");
        *slot = true;
    }
    queue.release();

    let rate = total as f64 / elapsed.as_secs_f64();
    tracing::info!(
        "finished round, items={total}, elapsed={}ms, rate={rate:.0}/s, node_memory={}",
        elapsed.as_millis(),
        ByteSize((total * Q::NODE_SIZE) as u64).display().iec_short()
    );
    Ok(())
}
