//! Pipeline benchmark suite
//!
//! Benchmarks for chain throughput, channel capacity and fan-out.
//!
//! Run with: `cargo bench -p rill-pipeline`

use std::convert::Infallible;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rill_pipeline::{Processor, Source};
use tokio::runtime::Runtime;

fn ok<T>(value: T) -> Result<T, Infallible> {
    Ok(value)
}

/// Chain of `depth` map stages
fn map_chain(depth: usize) -> Processor<u64> {
    (0..depth).fold(Processor::new(), |processor, _| {
        processor.map(|x: u64, _| ok(x.wrapping_add(1)))
    })
}

/// Benchmark chunks per second through chains of growing depth
fn bench_chain_depth(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("chain_depth");
    let chunks = 1_000u64;

    for depth in [1, 2, 4, 8] {
        group.throughput(Throughput::Elements(chunks));
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let processor = map_chain(depth);

            b.to_async(&rt).iter(|| async {
                let items = processor.collect(Source::iter(0..chunks)).await.unwrap();
                black_box(items)
            });
        });
    }

    group.finish();
}

/// Benchmark the effect of inter-stage channel capacity
fn bench_channel_capacity(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("channel_capacity");
    let chunks = 1_000u64;

    for capacity in [1, 16, 256] {
        group.throughput(Throughput::Elements(chunks));
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &capacity| {
                let processor = map_chain(4).with_channel_capacity(capacity);

                b.to_async(&rt).iter(|| async {
                    let items = processor.collect(Source::iter(0..chunks)).await.unwrap();
                    black_box(items)
                });
            },
        );
    }

    group.finish();
}

/// Benchmark filter + reduce, the aggregate path
fn bench_filter_reduce(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("filter_reduce");
    let chunks = 10_000u64;

    let processor = Processor::new()
        .filter(|x: &u64| ok(x % 3 == 0))
        .reduce(|acc: u64, x| ok(acc + x));

    group.throughput(Throughput::Elements(chunks));
    group.bench_function("sum_multiples_of_3", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(processor.collect(Source::iter(0..chunks)).await.unwrap())
        });
    });

    group.finish();
}

/// Benchmark broadcasting the tail to several sinks
fn bench_start_multiple(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("start_multiple");
    let chunks = 1_000u64;

    for sinks in [1, 2, 4, 8] {
        group.throughput(Throughput::Elements(chunks));
        group.bench_with_input(BenchmarkId::from_parameter(sinks), &sinks, |b, &sinks| {
            let processor = map_chain(1);

            b.to_async(&rt).iter(|| async {
                let mut total = 0usize;
                for mut sink in processor.start_multiple(Source::iter(0..chunks), sinks) {
                    while let Some(message) = sink.recv().await {
                        black_box(message.unwrap());
                        total += 1;
                    }
                }
                total
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_chain_depth,
    bench_channel_capacity,
    bench_filter_reduce,
    bench_start_multiple,
);

criterion_main!(benches);
