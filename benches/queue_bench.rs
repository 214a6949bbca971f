//! Benchmarks for the pipeline hot paths.
//!
//! Benchmarks cover:
//! - Stage queue operations (push/pop/priority ordering)
//! - ResourcePool acquire/release under no contention and with contention
//! - Barrier bookkeeping

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use repair_pipeline::core::{
    Category, CompletionBarrier, PollingCounter, ResourceKind, ResourcePool, SharedQueue, Stage,
    WaitGroup, WorkItem, WorkItemFactory, WorkQueue,
};
use repair_pipeline::infra::queue::memory::InMemoryQueue;

// ============================================================================
// Helper Functions
// ============================================================================

fn build_items(count: u64) -> Vec<WorkItem> {
    let factory = WorkItemFactory::new(Duration::from_millis(1));
    (0..count)
        .map(|id| factory.create(id, Category::ALL[(id % 3) as usize]))
        .collect()
}

// ============================================================================
// Queue Benchmarks
// ============================================================================

fn bench_queue_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue/push_pop");

    for size in [10u64, 100, 1000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || build_items(size),
                |items| {
                    let mut queue = InMemoryQueue::with_capacity(items.len());
                    for item in items {
                        queue.push(item).unwrap();
                    }
                    while let Some(item) = queue.pop() {
                        black_box(item);
                    }
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_shared_queue_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue/shared_contention");
    group.throughput(Throughput::Elements(400));

    group.bench_function("4_producers_1_consumer", |b| {
        b.iter_batched(
            || build_items(400).chunks(100).map(<[WorkItem]>::to_vec).collect::<Vec<_>>(),
            |batches| {
                let queue = Arc::new(SharedQueue::new(Stage::Admission, Box::new(InMemoryQueue::new())));
                let producers: Vec<_> = batches
                    .into_iter()
                    .map(|batch| {
                        let queue = Arc::clone(&queue);
                        thread::spawn(move || {
                            for item in batch {
                                queue.push(item).unwrap();
                            }
                        })
                    })
                    .collect();
                let mut popped = 0;
                while popped < 400 {
                    if queue.pop().is_some() {
                        popped += 1;
                    }
                }
                for producer in producers {
                    producer.join().unwrap();
                }
            },
            criterion::BatchSize::SmallInput,
        );
    });
    group.finish();
}

// ============================================================================
// ResourcePool Benchmarks
// ============================================================================

fn bench_pool_uncontended(c: &mut Criterion) {
    let pool = ResourcePool::new(ResourceKind::Bay, 5).unwrap();
    c.bench_function("pool/acquire_release_uncontended", |b| {
        b.iter(|| {
            pool.acquire();
            pool.release().unwrap();
        });
    });
}

fn bench_pool_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool/contended");

    for threads in [2usize, 4, 8] {
        group.throughput(Throughput::Elements((threads * 100) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let pool = Arc::new(ResourcePool::new(ResourceKind::Technician, 3).unwrap());
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let pool = Arc::clone(&pool);
                        thread::spawn(move || {
                            for _ in 0..100 {
                                pool.acquire();
                                pool.release().unwrap();
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            });
        });
    }
    group.finish();
}

// ============================================================================
// Barrier Benchmarks
// ============================================================================

fn bench_barrier_bookkeeping(c: &mut Criterion) {
    let mut group = c.benchmark_group("barrier/add_done");
    let barriers: [(&str, Box<dyn CompletionBarrier>); 2] = [
        ("polling_counter", Box::new(PollingCounter::default())),
        ("wait_group", Box::new(WaitGroup::new())),
    ];

    for (name, barrier) in &barriers {
        group.bench_function(*name, |b| {
            b.iter(|| {
                barrier.add(1);
                barrier.done().unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_queue_push_pop,
    bench_shared_queue_contention,
    bench_pool_uncontended,
    bench_pool_contended,
    bench_barrier_bookkeeping
);
criterion_main!(benches);
