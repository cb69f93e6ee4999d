//! Throughput benchmarks for DEFLATE compression and decompression.
//!
//! Covers every compression level on three data shapes (random,
//! repeated, text-like) plus inflate throughput on the level 6 output.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oxiflate_deflate::{deflate, inflate, zlib_compress, zlib_decompress};
use std::hint::black_box;

type PatternGenerator = fn(usize) -> Vec<u8>;

fn generate_random(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut seed = 12345u32;
    for _ in 0..size {
        seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
        data.push((seed >> 16) as u8);
    }
    data
}

fn generate_repeated(size: usize) -> Vec<u8> {
    let pattern = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    pattern.iter().copied().cycle().take(size).collect()
}

fn generate_text_like(size: usize) -> Vec<u8> {
    let words: &[&[u8]] = &[
        b"the", b"quick", b"brown", b"fox", b"jumps", b"over", b"lazy", b"dog", b"and", b"runs",
        b"through", b"forest", b"near", b"river", b"under", b"blue", b"sky", b"with", b"wind",
        b"blowing",
    ];
    let mut data = Vec::with_capacity(size);
    let mut seed = 42u32;
    while data.len() < size {
        seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
        data.extend_from_slice(words[(seed as usize) % words.len()]);
        data.push(b' ');
    }
    data.truncate(size);
    data
}

const PATTERNS: [(&str, PatternGenerator); 3] = [
    ("random", generate_random),
    ("repeated", generate_repeated),
    ("text", generate_text_like),
];

const SIZE: usize = 256 * 1024;

fn bench_deflate_levels(c: &mut Criterion) {
    for (name, generate) in PATTERNS {
        let data = generate(SIZE);
        let mut group = c.benchmark_group(format!("deflate_{}", name));
        group.throughput(Throughput::Bytes(data.len() as u64));
        for level in [0u8, 1, 3, 4, 6, 9] {
            group.bench_with_input(BenchmarkId::new("level", level), &data, |b, data| {
                b.iter(|| deflate(black_box(data), level))
            });
        }
        group.finish();
    }
}

fn bench_inflate(c: &mut Criterion) {
    let mut group = c.benchmark_group("inflate");
    for (name, generate) in PATTERNS {
        let data = generate(SIZE);
        let Ok(compressed) = deflate(&data, 6) else {
            continue;
        };
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::new("raw", name), &compressed, |b, compressed| {
            b.iter(|| inflate(black_box(compressed)))
        });
    }
    group.finish();
}

fn bench_zlib_roundtrip(c: &mut Criterion) {
    let data = generate_text_like(64 * 1024);
    let mut group = c.benchmark_group("zlib");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("roundtrip_64k", |b| {
        b.iter(|| {
            zlib_compress(black_box(&data), 6).and_then(|compressed| zlib_decompress(&compressed))
        })
    });
    group.finish();
}

criterion_group!(benches, bench_deflate_levels, bench_inflate, bench_zlib_roundtrip);
criterion_main!(benches);
