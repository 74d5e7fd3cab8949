//! Performance benchmarks for the offline queue hot paths.
//!
//! The enqueue path runs on every failed dispatch and the prioritize pass
//! runs before every drain cycle, so both must stay cheap even with the
//! queue at capacity.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench queue_bench
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use gatenode_core::HttpMethod;
use gatenode_core::constants::DEFAULT_QUEUE_CAPACITY;
use gatenode_net::{OfflineQueue, QueuedRequest};
use gatenode_storage::MemoryStore;
use std::hint::black_box;

fn request(i: usize, critical: bool) -> QueuedRequest {
    QueuedRequest::new(
        format!("http://server.local:5000/api/event/{i}"),
        HttpMethod::Post,
        br#"{"card":"12345678","direction":"entry"}"#.to_vec(),
        critical,
    )
}

async fn full_queue(critical_every: usize) -> OfflineQueue<MemoryStore> {
    let mut queue = OfflineQueue::new(MemoryStore::new(), DEFAULT_QUEUE_CAPACITY);
    for i in 0..DEFAULT_QUEUE_CAPACITY {
        queue.enqueue(request(i, i % critical_every == 0)).await;
    }
    queue
}

/// Benchmark enqueueing into a full queue (worst case: every push evicts
/// and the whole queue is re-serialized).
fn bench_enqueue_full(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let mut group = c.benchmark_group("enqueue_full");
    group.throughput(Throughput::Elements(1));

    group.bench_function("enqueue_with_eviction", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut queue = full_queue(5).await;
                queue.enqueue(black_box(request(999, false))).await;
                black_box(queue.len());
            });
        });
    });

    group.finish();
}

/// Benchmark the critical-first partition at various critical densities.
fn bench_prioritize(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let mut group = c.benchmark_group("prioritize");
    group.throughput(Throughput::Elements(DEFAULT_QUEUE_CAPACITY as u64));

    for critical_every in [2usize, 5, 10] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("critical_1_in_{critical_every}")),
            &critical_every,
            |b, &critical_every| {
                b.iter(|| {
                    rt.block_on(async {
                        let mut queue = full_queue(critical_every).await;
                        queue.prioritize().await;
                        black_box(queue.front().cloned());
                    });
                });
            },
        );
    }

    group.finish();
}

/// Benchmark serializing and reloading a full queue, the reboot path.
fn bench_persistence_round_trip(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let mut group = c.benchmark_group("persistence");
    group.throughput(Throughput::Elements(DEFAULT_QUEUE_CAPACITY as u64));

    group.bench_function("reload_full_queue", |b| {
        // Populate the store once outside the measured loop; MemoryStore
        // clones share the underlying map.
        let store = rt.block_on(async {
            let store = MemoryStore::new();
            let mut queue = OfflineQueue::new(store.clone(), DEFAULT_QUEUE_CAPACITY);
            for i in 0..DEFAULT_QUEUE_CAPACITY {
                queue.enqueue(request(i, i % 5 == 0)).await;
            }
            store
        });

        b.iter(|| {
            rt.block_on(async {
                let mut queue =
                    OfflineQueue::new(store.clone(), DEFAULT_QUEUE_CAPACITY);
                queue.load().await;
                black_box(queue.len());
            });
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_enqueue_full,
    bench_prioritize,
    bench_persistence_round_trip
);
criterion_main!(benches);
