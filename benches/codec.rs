//! Criterion benchmarks for the Sorbet writer and reader.
//!
//! Run with:
//!   cargo bench --bench codec

use std::io::Cursor;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sorbet::{Column, ColumnKind, Reader, Schema, Writer, WriterOptions};

const ROWS: usize = 10_000;

fn bench_schema() -> Schema {
    Schema::new(vec![
        Column::new("id", ColumnKind::Long),
        Column::new("score", ColumnKind::Double),
        Column::new("label", ColumnKind::String),
    ])
}

fn write_file(compress: bool) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut w = Writer::open(
        Cursor::new(&mut bytes),
        &bench_schema(),
        &WriterOptions {
            compress,
            ..WriterOptions::default()
        },
    )
    .unwrap();
    for i in 0..ROWS as i64 {
        w.write_long(Some(i)).unwrap();
        w.write_double(Some(i as f64 * 0.125)).unwrap();
        w.write_string(Some(&format!("label-{:06}", i % 997))).unwrap();
    }
    w.close().unwrap();
    bytes
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("sorbet_codec");

    for compress in [false, true] {
        let label = if compress { "gzip" } else { "raw" };
        let file = write_file(compress);
        group.throughput(Throughput::Bytes(file.len() as u64));

        group.bench_with_input(BenchmarkId::new("write", label), &compress, |b, &compress| {
            b.iter(|| write_file(compress))
        });

        group.bench_with_input(BenchmarkId::new("read", label), &file, |b, file| {
            b.iter(|| {
                let mut r = Reader::open(Cursor::new(file.clone())).unwrap();
                let mut rows = 0usize;
                while r.read_row().unwrap().is_some() {
                    rows += 1;
                }
                rows
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
