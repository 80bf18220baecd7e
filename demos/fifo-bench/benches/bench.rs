use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use fifo_bench::{Mpsc, PtrFifo, RefFifo};

const BUFLENS: &[usize] = &[16, 256, 1024];

type BenchFn = fn(usize) -> Duration;
type BatchFn = fn(usize, usize) -> Duration;

fn groups(c: &mut Criterion) {
    macro_rules! channels {
        ($f:ident as $ty:ty) => ([
            ("ref", fifo_bench::$f::<RefFifo> as $ty),
            ("ptr", fifo_bench::$f::<PtrFifo> as $ty),
            ("mpsc", fifo_bench::$f::<Mpsc> as $ty),
        ]);
    }

    let mut g = c.benchmark_group("fifo_benchmark");
    for (name, f) in channels![ping as BenchFn] {
        let id = format!("fifo_ping_{name}");
        g.bench_function(&id, |b| b.iter_custom(|iters| f(iters as usize)));
    }
    for (name, f) in channels![stream as BenchFn] {
        let id = format!("fifo_stream_{name}");
        g.bench_function(&id, |b| b.iter_custom(|iters| f(iters as usize)));
    }
    for (i, buflen) in BUFLENS.iter().copied().enumerate() {
        for (name, f) in channels![batch as BatchFn] {
            let id = format!("fifo_batch_{i:02}_{buflen}_{name}");
            g.bench_function(&id, |b| b.iter_custom(|iters| f(iters as usize, buflen)));
        }
    }
    g.finish();
}

criterion_group!(
    name = fifo_benchmark;
    config = Criterion::default().sample_size(50).measurement_time(Duration::from_secs(10));
    targets = groups
);
criterion_main!(fifo_benchmark);
