//! Benchmarks for sentence classification, field parsing and merging.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use nmea_fix::{Decoder, FixRecord, ReaderSource, classify, parse_fields};
use std::io::Cursor;

/// Sample sentences for benchmarking.
const SAMPLE_SENTENCES: &[&str] = &[
    "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47",
    "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A",
    "$GPGSA,A,3,04,05,,09,12,,,24,,,,,2.5,1.3,2.1*39",
    "$GPGSV,3,1,11,03,03,111,00,04,15,270,00,06,01,010,00,13,06,292,00*74",
    "$GPGSV,3,2,11,14,25,170,00,16,57,208,39,18,67,296,40,19,40,246,00*74",
    "$GPGLL,4916.45,N,12311.12,W,225444,A",
    "$GPHDT,274.07,T*03",
    "$GPZDA,201530.00,04,07,2002,00,00*60",
];

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    group.throughput(Throughput::Elements(1));
    group.bench_function("single", |b| {
        b.iter(|| classify(black_box(SAMPLE_SENTENCES[0])))
    });

    group.bench_function("garbage", |b| {
        b.iter(|| classify(black_box("GPGGA,123519,4807.038,N")))
    });

    group.finish();
}

fn bench_parse_and_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_and_merge");

    group.throughput(Throughput::Elements(SAMPLE_SENTENCES.len() as u64));
    group.bench_function("talker_cycle", |b| {
        b.iter(|| {
            let mut fix = FixRecord::new();
            for line in SAMPLE_SENTENCES {
                if let Some((kind, fields)) = classify(black_box(line)) {
                    fix.merge(parse_fields(kind, &fields), kind);
                }
            }
            fix
        })
    });

    group.finish();
}

fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_pipeline");

    // Mix of sentences and line noise
    let mut stream = String::new();
    for line in SAMPLE_SENTENCES {
        stream.push_str(line);
        stream.push_str("\r\n");
        stream.push_str("#garbled\n");
    }
    let stream = stream.into_bytes();

    group.throughput(Throughput::Bytes(stream.len() as u64));
    group.bench_function("decode_stream", |b| {
        b.iter(|| {
            let mut decoder = Decoder::new(ReaderSource::new(Cursor::new(stream.as_slice())));
            while decoder.read_once().is_ok() {}
            decoder.fix().satellites().len()
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_classify,
    bench_parse_and_merge,
    bench_full_pipeline
);
criterion_main!(benches);
