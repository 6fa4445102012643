use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use sensornet::{FairRwLock, PhaseBarrier};

fn bench_rwlock_uncontended(c: &mut Criterion) {
    let lock = FairRwLock::new(0u64);
    c.bench_function("sync/rwlock_read_uncontended", |b| {
        b.iter(|| black_box(*lock.read()));
    });
    c.bench_function("sync/rwlock_write_uncontended", |b| {
        b.iter(|| *lock.write() += 1);
    });
}

fn bench_rwlock_contended(c: &mut Criterion) {
    const OPS: u64 = 10_000;

    let mut group = c.benchmark_group("sync/rwlock_contended");
    group.throughput(Throughput::Elements(OPS * 4));
    group.bench_function("three_readers_one_writer", |b| {
        b.iter_custom(|iters| {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
                // Fresh lock per sample so waiter state does not leak
                // between samples.
                let lock = Arc::new(FairRwLock::new(0u64));
                let started = Instant::now();

                let mut handles = Vec::new();
                for _ in 0..3 {
                    let lock = Arc::clone(&lock);
                    handles.push(thread::spawn(move || {
                        for _ in 0..OPS {
                            black_box(*lock.read());
                        }
                    }));
                }
                {
                    let lock = Arc::clone(&lock);
                    handles.push(thread::spawn(move || {
                        for _ in 0..OPS {
                            *lock.write() += 1;
                        }
                    }));
                }
                for handle in handles {
                    handle.join().unwrap();
                }
                total += started.elapsed();
            }
            total
        });
    });
    group.finish();
}

fn bench_barrier_cycle(c: &mut Criterion) {
    const PHASES: u64 = 10_000;

    let mut group = c.benchmark_group("sync/barrier");
    group.throughput(Throughput::Elements(PHASES));
    group.bench_function("two_party_cycle", |b| {
        b.iter_custom(|iters| {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
                let barrier = PhaseBarrier::shared(2);
                let started = Instant::now();

                let peer = {
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        for _ in 0..PHASES {
                            barrier.wait();
                        }
                    })
                };
                for _ in 0..PHASES {
                    barrier.wait();
                }
                peer.join().unwrap();
                total += started.elapsed();
            }
            total
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_rwlock_uncontended,
    bench_rwlock_contended,
    bench_barrier_cycle
);
criterion_main!(benches);
