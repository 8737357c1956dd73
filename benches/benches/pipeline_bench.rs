use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use wavecal_core::{
    analyze, filter,
    format::{descriptor_template, encode_waveform},
    locate, parse, AnalysisOptions, ScaleOverrides,
};
use wavecal_types::{SampleWidth, SteadyParams};

/// Ступенька с детерминированным "шумом" без зависимости от rand.
fn step(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let level = if i < n / 10 { 0.0 } else { 3.3 };
            level + ((i * 7_919) % 101) as f64 * 1e-4
        })
        .collect()
}

fn capture(n: u32) -> Vec<u8> {
    let mut desc = descriptor_template(SampleWidth::Word, n);
    desc.vertical_gain = 0.01;
    desc.horiz_interval = 1e-6;

    let raw: Vec<i16> = (0..n as usize)
        .map(|i| {
            let level: i16 = if i < n as usize / 10 { 0 } else { 8_250 };
            level + (i % 7) as i16
        })
        .collect();

    encode_waveform(&desc, &raw).unwrap()
}

fn bench_parse(c: &mut Criterion) {
    let bytes = capture(100_000);

    c.bench_function("parse_wavedesc", |b| b.iter(|| parse(black_box(&bytes)).unwrap()));
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");

    for n in [10_000usize, 100_000, 1_000_000] {
        let values = step(n);
        let times: Vec<f64> = (0..n).map(|i| i as f64 * 1e-6).collect();

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| filter(black_box(&times), black_box(&values), 1_000.0, 4).unwrap())
        });
    }

    group.finish();
}

fn bench_locate(c: &mut Criterion) {
    let mut group = c.benchmark_group("locate");

    for n in [10_000usize, 100_000, 1_000_000] {
        let values = step(n);

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| locate(black_box(&values), &SteadyParams::default()).unwrap())
        });
    }

    group.finish();
}

fn bench_analyze(c: &mut Criterion) {
    let bytes = capture(250_000);
    let options = AnalysisOptions::default();

    c.bench_function("analyze_250k", |b| {
        b.iter(|| analyze(black_box(&bytes), &options, ScaleOverrides::default()).unwrap())
    });
}

criterion_group!(benches, bench_parse, bench_filter, bench_locate, bench_analyze);
criterion_main!(benches);
