//! Throughput benchmarks for the three encoders and in-place conversion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use delta::{diff_correcting, diff_greedy, diff_onepass, make_inplace, CyclePolicy, EncodeOptions};

/// A reference buffer and a version buffer that shuffles its 256-byte blocks,
/// giving every encoder a realistic mix of long copies and short adds.
fn shuffled_pair(size: usize) -> (Vec<u8>, Vec<u8>) {
    let r: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    let block = 256.min(size.max(1));
    let mut v = Vec::with_capacity(size);
    for chunk in r.chunks(block).rev() {
        v.extend_from_slice(chunk);
    }
    (r, v)
}

fn bench_encoders(c: &mut Criterion) {
    let sizes: &[usize] = &[4096, 65536, 1_048_576];
    let opts = EncodeOptions::default();
    let mut group = c.benchmark_group("encode");

    for &size in sizes {
        let (r, v) = shuffled_pair(size);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("greedy", size), &size, |b, _| {
            b.iter(|| black_box(diff_greedy(black_box(&r), black_box(&v), &opts).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("onepass", size), &size, |b, _| {
            b.iter(|| black_box(diff_onepass(black_box(&r), black_box(&v), &opts).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("correcting", size), &size, |b, _| {
            b.iter(|| black_box(diff_correcting(black_box(&r), black_box(&v), &opts).unwrap()));
        });
    }
    group.finish();
}

fn bench_inplace_conversion(c: &mut Criterion) {
    let sizes: &[usize] = &[4096, 65536, 262_144];
    let opts = EncodeOptions::default();
    let mut group = c.benchmark_group("make_inplace");

    for &size in sizes {
        let (r, v) = shuffled_pair(size);
        let commands = diff_greedy(&r, &v, &opts).unwrap();
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("localmin", size), &size, |b, _| {
            b.iter(|| black_box(make_inplace(black_box(&r), black_box(&commands), CyclePolicy::Localmin)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encoders, bench_inplace_conversion);
criterion_main!(benches);
