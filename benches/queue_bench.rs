use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;
use flume::bounded as flume_bounded;
use lfring::{Backoff, LfQueue, Queue};
use std::sync::mpsc::sync_channel;

const MESSAGES: usize = 200_000;
const BUFFER_P2SIZE: u32 = 10;
const BUFFER_SIZE: usize = 1 << BUFFER_P2SIZE;

fn lfqueue(p2size: u32) -> Arc<LfQueue<usize>> {
    Arc::new(
        LfQueue::builder()
            .pow2(p2size)
            .backoff(Backoff::spin_only())
            .build()
            .unwrap(),
    )
}

fn push_spin(q: &LfQueue<usize>, mut v: usize) {
    while let Err(err) = q.bound_push(v) {
        v = err.into_inner();
        std::hint::spin_loop();
    }
}

fn pop_spin(q: &LfQueue<usize>) -> usize {
    loop {
        if let Some(v) = q.pop() {
            return v;
        }
        std::hint::spin_loop();
    }
}

fn bench_1p_1c(c: &mut Criterion) {
    let mut group = c.benchmark_group("1p_1c");
    group.throughput(Throughput::Elements(MESSAGES as u64));

    group.bench_function("lfring", |b| {
        b.iter(|| {
            let queue = lfqueue(BUFFER_P2SIZE);
            let q_push = queue.clone();

            let producer = thread::spawn(move || {
                for i in 0..MESSAGES {
                    push_spin(&q_push, black_box(i));
                }
            });

            let consumer = thread::spawn(move || {
                for _ in 0..MESSAGES {
                    black_box(pop_spin(&queue));
                }
            });

            producer.join().unwrap();
            consumer.join().unwrap();
        });
    });

    group.bench_function("crossbeam_channel", |b| {
        b.iter(|| {
            let (tx, rx) = bounded::<usize>(BUFFER_SIZE);

            let producer = thread::spawn(move || {
                for i in 0..MESSAGES {
                    tx.send(black_box(i)).unwrap();
                }
            });

            let consumer = thread::spawn(move || {
                for _ in 0..MESSAGES {
                    rx.recv().unwrap();
                }
            });

            producer.join().unwrap();
            consumer.join().unwrap();
        });
    });

    group.bench_function("flume", |b| {
        b.iter(|| {
            let (tx, rx) = flume_bounded::<usize>(BUFFER_SIZE);

            let producer = thread::spawn(move || {
                for i in 0..MESSAGES {
                    tx.send(black_box(i)).unwrap();
                }
            });

            let consumer = thread::spawn(move || {
                for _ in 0..MESSAGES {
                    rx.recv().unwrap();
                }
            });

            producer.join().unwrap();
            consumer.join().unwrap();
        });
    });

    group.bench_function("std_mpsc", |b| {
        b.iter(|| {
            let (tx, rx) = sync_channel::<usize>(BUFFER_SIZE);

            let producer = thread::spawn(move || {
                for i in 0..MESSAGES {
                    tx.send(black_box(i)).unwrap();
                }
            });

            let consumer = thread::spawn(move || {
                for _ in 0..MESSAGES {
                    rx.recv().unwrap();
                }
            });

            producer.join().unwrap();
            consumer.join().unwrap();
        });
    });

    group.finish();
}

fn bench_np_mc(c: &mut Criterion) {
    let mut group = c.benchmark_group("4p_4c");
    group.throughput(Throughput::Elements(MESSAGES as u64));
    const PRODUCERS: usize = 4;
    const CONSUMERS: usize = 4;
    const MSGS_PER_PRODUCER: usize = MESSAGES / PRODUCERS;
    const MSGS_PER_CONSUMER: usize = MESSAGES / CONSUMERS;

    group.bench_function("lfring", |b| {
        b.iter(|| {
            let queue = lfqueue(BUFFER_P2SIZE);
            let mut handles = vec![];

            for p in 0..PRODUCERS {
                let q = queue.clone();
                handles.push(thread::spawn(move || {
                    for i in 0..MSGS_PER_PRODUCER {
                        push_spin(&q, black_box(p * MSGS_PER_PRODUCER + i));
                    }
                }));
            }

            for _ in 0..CONSUMERS {
                let q = queue.clone();
                handles.push(thread::spawn(move || {
                    for _ in 0..MSGS_PER_CONSUMER {
                        black_box(pop_spin(&q));
                    }
                }));
            }

            for h in handles {
                h.join().unwrap();
            }
        });
    });

    group.bench_function("crossbeam_channel", |b| {
        b.iter(|| {
            let (tx, rx) = bounded::<usize>(BUFFER_SIZE);
            let mut handles = vec![];

            for p in 0..PRODUCERS {
                let tx = tx.clone();
                handles.push(thread::spawn(move || {
                    for i in 0..MSGS_PER_PRODUCER {
                        tx.send(black_box(p * MSGS_PER_PRODUCER + i)).unwrap();
                    }
                }));
            }
            drop(tx);

            for _ in 0..CONSUMERS {
                let rx = rx.clone();
                handles.push(thread::spawn(move || {
                    for _ in 0..MSGS_PER_CONSUMER {
                        rx.recv().unwrap();
                    }
                }));
            }

            for h in handles {
                h.join().unwrap();
            }
        });
    });

    group.bench_function("flume", |b| {
        b.iter(|| {
            let (tx, rx) = flume_bounded::<usize>(BUFFER_SIZE);
            let mut handles = vec![];

            for p in 0..PRODUCERS {
                let tx = tx.clone();
                handles.push(thread::spawn(move || {
                    for i in 0..MSGS_PER_PRODUCER {
                        tx.send(black_box(p * MSGS_PER_PRODUCER + i)).unwrap();
                    }
                }));
            }
            drop(tx);

            for _ in 0..CONSUMERS {
                let rx = rx.clone();
                handles.push(thread::spawn(move || {
                    for _ in 0..MSGS_PER_CONSUMER {
                        rx.recv().unwrap();
                    }
                }));
            }

            for h in handles {
                h.join().unwrap();
            }
        });
    });

    group.finish();
}

/// Fill from the smallest ring, paying for every doubling on the way.
fn bench_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("grow_from_2");
    group.throughput(Throughput::Elements(MESSAGES as u64));

    group.bench_function("lfring", |b| {
        b.iter_batched(
            || lfqueue(1),
            |queue| {
                for i in 0..MESSAGES {
                    queue.push(black_box(i)).unwrap();
                }
                queue
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("lfring_plain_queue", |b| {
        b.iter_batched(
            || Queue::with_pow2(1).unwrap(),
            |mut queue| {
                for i in 0..MESSAGES {
                    queue.push(black_box(i)).unwrap();
                }
                queue
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_1p_1c, bench_np_mc, bench_growth);
criterion_main!(benches);
