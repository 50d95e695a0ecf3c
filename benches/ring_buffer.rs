//! Throughput of the per-source Ring Buffer under push and drain load.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use logstream_hub::buffer::{NextRecord, RawRecord, RingBuffer};

fn bench_push(c: &mut Criterion) {
    let rb = RingBuffer::new(4096);
    let mut group = c.benchmark_group("ring_buffer_push");
    group.bench_function("push_no_subscriber", |b| {
        b.iter(|| rb.push(black_box(RawRecord::new("<14>1 2024-01-01T00:00:00Z host app - - - hello"))));
    });
    group.finish();
}

fn bench_push_and_drain(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    c.bench_function("ring_buffer_push_and_drain", |b| {
        b.to_async(&runtime).iter(|| async {
            let rb = RingBuffer::new(1024);
            let mut cursor = rb.subscribe();
            for i in 0..1024 {
                rb.push(RawRecord::new(format!("record-{i}")));
            }
            let mut seen = 0;
            while seen < 1024 {
                match cursor.next().await {
                    NextRecord::Record(_) => seen += 1,
                    NextRecord::SlowConsumer { .. } => continue,
                    NextRecord::Closed => break,
                }
            }
            black_box(seen)
        });
    });
}

criterion_group!(benches, bench_push, bench_push_and_drain);
criterion_main!(benches);
