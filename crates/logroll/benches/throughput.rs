use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use logroll::{Buffer, RotatingSink, SinkConfig};

const RECORD: &[u8] = b"2024-01-01T00:00:00Z INFO request completed status=200 elapsed_ms=3\n";

fn buffer_put_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer");
    group.throughput(Throughput::Elements(1));

    group.bench_function("put", |b| {
        let buffer = Buffer::default();
        b.iter(|| buffer.put(RECORD));
    });

    group.bench_function("put_get", |b| {
        let buffer = Buffer::default();
        b.iter(|| {
            buffer.put(RECORD);
            buffer.get()
        });
    });

    group.finish();
}

fn sink_put(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let config = SinkConfig::builder()
        .path(dir.path().join("bench.log"))
        .max_size_kb(1024)
        .build()
        .unwrap();

    let sink = RotatingSink::new(config);
    {
        let _guard = runtime.enter();
        sink.start().unwrap();
    }

    let mut group = c.benchmark_group("sink");
    group.throughput(Throughput::Bytes(RECORD.len() as u64));
    group.bench_function("put", |b| b.iter(|| sink.put(RECORD)));
    group.finish();

    runtime.block_on(sink.shutdown());
}

criterion_group!(benches, buffer_put_get, sink_put);
criterion_main!(benches);
