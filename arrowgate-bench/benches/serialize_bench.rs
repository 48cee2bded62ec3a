//! Arrow IPC serialization benchmarks.

use arrowgate_core::ipc::decode_stream;
use arrowgate_core::{ArrowIpcSerializer, Compression, SerializationOptions, Serializer, Table};
use arrowgate_server::build_frame;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");
    let serializer = ArrowIpcSerializer;
    let options = SerializationOptions::default();

    for rows in [1_000, 10_000, 100_000] {
        let table = Table::sample(rows);

        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &table, |b, table| {
            b.iter(|| black_box(serializer.serialize(table, &options).unwrap()));
        });
    }

    group.finish();
}

fn bench_compression(c: &mut Criterion) {
    let mut group = c.benchmark_group("compression");
    let serializer = ArrowIpcSerializer;
    let table = Table::sample(100_000);
    group.throughput(Throughput::Elements(100_000));

    for compression in [Compression::Uncompressed, Compression::Zstd, Compression::Lz4] {
        let options = SerializationOptions::default().with_compression(compression);
        group.bench_with_input(
            BenchmarkId::from_parameter(compression),
            &options,
            |b, options| {
                b.iter(|| black_box(serializer.serialize(&table, options).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_batch_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_size");
    let serializer = ArrowIpcSerializer;
    let table = Table::sample(100_000);
    group.throughput(Throughput::Elements(100_000));

    for batch_size in [1_024, 8_192, 65_536] {
        let options = SerializationOptions::default().with_batch_size(batch_size);
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &options,
            |b, options| {
                b.iter(|| black_box(serializer.serialize(&table, options).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_build_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_frame");
    let serializer = ArrowIpcSerializer;
    let options = SerializationOptions::default();
    let table = Table::sample(10_000);

    group.throughput(Throughput::Elements(10_000));
    group.bench_function("sample_10000", |b| {
        b.iter(|| black_box(build_frame(&serializer, &table, &options).unwrap()));
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_stream");
    let serializer = ArrowIpcSerializer;

    for rows in [1_000, 100_000] {
        let payload = serializer
            .serialize(&Table::sample(rows), &SerializationOptions::default())
            .unwrap();

        group.throughput(Throughput::Bytes(payload.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &payload, |b, payload| {
            b.iter(|| black_box(decode_stream(payload).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_serialize,
    bench_compression,
    bench_batch_size,
    bench_build_frame,
    bench_decode,
);
criterion_main!(benches);
