//! Block Conversion Performance Benchmark
//!
//! Measures decode + pad + FFT + normalize throughput for typical block sizes.
//!
//! **Goal:** One block must convert well inside its own capture interval
//! **Target:** 960 samples (16 ms at 60 kHz) in under 1 ms

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use num_complex::Complex64;
use soundwave_web::spectrum::{analyze_block, fft_in_place, BitDepth};

fn raw_block(samples: usize) -> Vec<u8> {
    (0..samples)
        .flat_map(|i| {
            let value = ((i as f64 * 0.05).sin() * i32::MAX as f64 * 0.5) as i32;
            value.to_le_bytes()
        })
        .collect()
}

fn bench_analyze_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze_block");

    for samples in [240usize, 960, 4096] {
        let raw = raw_block(samples);
        group.bench_with_input(BenchmarkId::from_parameter(samples), &raw, |b, raw| {
            b.iter(|| black_box(analyze_block(black_box(raw), BitDepth::ThirtyTwo)));
        });
    }

    group.finish();
}

fn bench_fft(c: &mut Criterion) {
    let mut group = c.benchmark_group("fft_in_place");

    for len in [256usize, 1024, 4096] {
        let input: Vec<Complex64> = (0..len).map(|i| Complex64::new(i as f64, 0.0)).collect();
        group.bench_with_input(BenchmarkId::from_parameter(len), &input, |b, input| {
            b.iter(|| {
                let mut buffer = input.clone();
                fft_in_place(&mut buffer);
                black_box(buffer)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_analyze_block, bench_fft);
criterion_main!(benches);
