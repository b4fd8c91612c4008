//! # Deferred Store Benchmarks
//!
//! | Path | What is measured |
//! |------|------------------|
//! | queue + replay | N puts issued before `open`, then `open` draining them |
//! | direct | N puts issued and awaited while ready |
//! | deferred iterator | iterator requested before `open`, N entries read after |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use deferred_store::{DeferredStore, InMemoryStore, OpenOptions, RangeOptions, WriteOptions};
use rand::Rng;
use std::time::Duration;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("benchmark runtime")
}

fn random_entries(count: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let key: [u8; 16] = rng.gen();
            let value: [u8; 32] = rng.gen();
            (key.to_vec(), value.to_vec())
        })
        .collect()
}

// ============================================================================
// Queue + replay vs direct forwarding
// ============================================================================

fn bench_put_paths(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("deferred-store-put");
    group.measurement_time(Duration::from_secs(5));

    for size in [100, 1_000, 10_000] {
        let entries = random_entries(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("queue_and_replay", size), &entries, |b, entries| {
            b.iter(|| {
                rt.block_on(async {
                    let db = DeferredStore::new(InMemoryStore::new());
                    let pending: Vec<_> = entries
                        .iter()
                        .map(|(k, v)| db.put(k.clone(), v.clone(), WriteOptions::default()))
                        .collect();
                    db.open(OpenOptions::default()).await.unwrap();
                    for put in pending {
                        put.await.unwrap();
                    }
                    black_box(db.inner().len())
                })
            })
        });

        group.bench_with_input(BenchmarkId::new("direct", size), &entries, |b, entries| {
            b.iter(|| {
                rt.block_on(async {
                    let db = DeferredStore::new(InMemoryStore::new());
                    db.open(OpenOptions::default()).await.unwrap();
                    for (k, v) in entries {
                        db.put(k.clone(), v.clone(), WriteOptions::default())
                            .await
                            .unwrap();
                    }
                    black_box(db.inner().len())
                })
            })
        });
    }

    group.finish();
}

// ============================================================================
// Deferred iterator binding and replay
// ============================================================================

fn bench_deferred_iterator(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("deferred-store-iterator");

    for size in [100, 1_000] {
        let entries = random_entries(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("bind_and_drain", size), &entries, |b, entries| {
            b.iter(|| {
                rt.block_on(async {
                    let db = DeferredStore::new(InMemoryStore::new());
                    let _ = db.batch(
                        entries
                            .iter()
                            .map(|(k, v)| deferred_store::BatchOperation::put(k.clone(), v.clone()))
                            .collect(),
                        WriteOptions::default(),
                    );
                    let iterator = db.iterator(RangeOptions::all());
                    let nexts: Vec<_> = (0..entries.len()).map(|_| iterator.next()).collect();

                    db.open(OpenOptions::default()).await.unwrap();

                    let mut read = 0usize;
                    for next in nexts {
                        if next.await.unwrap().is_some() {
                            read += 1;
                        }
                    }
                    black_box(read)
                })
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_put_paths, bench_deferred_iterator);
criterion_main!(benches);
