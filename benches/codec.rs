//! Codec and write path benchmarks.
//!
//! Run with: `cargo bench --bench codec`
//! Compare baselines: `cargo bench --bench codec -- --baseline main`
//!
//! Covers the per-value work on every read and write (store encoding and
//! decoding), the text escaping used by export/import, INI parsing, and
//! the queued write path end to end against the in-memory backend.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use regopts::options::{ValueType, VariantValue};
use regopts::persistence::{IniDocument, OptionStore, StoreConfig, ValueCodec};
use regopts::storage::{InMemoryStore, StoreType};

/// Benchmark ValueCodec::encode for each value type
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Elements(1));

    let int = VariantValue::Int(-12345);
    group.bench_function("int", |b| b.iter(|| ValueCodec::encode(black_box(&int))));

    let flag = VariantValue::Bool(true);
    group.bench_function("bool", |b| b.iter(|| ValueCodec::encode(black_box(&flag))));

    for len in [16, 256, 4096] {
        let text = VariantValue::String("x".repeat(len));
        group.bench_function(format!("string_{}", len), |b| {
            b.iter(|| ValueCodec::encode(black_box(&text)))
        });
    }

    group.finish();
}

/// Benchmark ValueCodec::decode, including the NUL scan for strings
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(1));

    let word = 42u32.to_le_bytes();
    group.bench_function("word_as_int", |b| {
        b.iter(|| ValueCodec::decode(black_box(&word), StoreType::Word, ValueType::Int))
    });
    group.bench_function("word_as_bool", |b| {
        b.iter(|| ValueCodec::decode(black_box(&word), StoreType::Word, ValueType::Bool))
    });

    for len in [16, 256, 4096] {
        // Oversized buffer with the terminator in the middle, as after a resized read
        let mut bytes = vec![b'y'; len];
        bytes.push(0);
        bytes.extend(std::iter::repeat(0xAA).take(len));
        group.bench_function(format!("string_{}", len), |b| {
            b.iter(|| ValueCodec::decode(black_box(&bytes), StoreType::String, ValueType::String))
        });
    }

    group.finish();
}

/// Benchmark text escaping for the export file
fn bench_escape(c: &mut Criterion) {
    let mut group = c.benchmark_group("escape");
    group.throughput(Throughput::Elements(1));

    let plain = "Main window title";
    let noisy = " C:\\Temp\\a=b\r\n\tend ";

    group.bench_function("escape_plain", |b| b.iter(|| ValueCodec::escape(black_box(plain))));
    group.bench_function("escape_noisy", |b| b.iter(|| ValueCodec::escape(black_box(noisy))));

    let escaped = ValueCodec::escape(noisy);
    group.bench_function("unescape_noisy", |b| {
        b.iter(|| ValueCodec::unescape(black_box(&escaped)))
    });

    group.finish();
}

/// Benchmark parsing a two-section export file
fn bench_ini_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("ini_parse");

    for entries in [10, 100, 1000] {
        let mut text = String::from("[Options]\n");
        for i in 0..entries {
            text.push_str(&format!("Section{}/Value{}={}\n", i % 7, i, i));
        }
        text.push_str("[Options.TypeInfo]\n");
        for i in 0..entries {
            text.push_str(&format!("Section{}/Value{}=int\n", i % 7, i));
        }

        group.throughput(Throughput::Elements(entries as u64));
        group.bench_function(format!("entries_{}", entries), |b| {
            b.iter(|| IniDocument::parse(black_box(&text)))
        });
    }

    group.finish();
}

/// Benchmark queued writes through the worker, flushed per batch
fn bench_write_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_path");
    let store = match OptionStore::open(InMemoryStore::new(), &StoreConfig::test()) {
        Ok(store) => store,
        Err(e) => panic!("open failed: {}", e),
    };

    for batch in [1, 64] {
        group.throughput(Throughput::Elements(batch));
        group.bench_function(format!("async_batch_{}", batch), |b| {
            b.iter(|| {
                for i in 0..batch {
                    store.write_async("Bench/Value", VariantValue::Int(i as i32));
                }
                store.flush();
            })
        });
    }

    group.bench_function("sync_read", |b| {
        b.iter(|| store.read(black_box("Bench/Value"), ValueType::Int))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode,
    bench_escape,
    bench_ini_parse,
    bench_write_path,
);

criterion_main!(benches);
