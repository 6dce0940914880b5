//! Criterion benchmarks for the ingestion hot path.
//!
//! Benchmarks:
//! 1. Full feature transform (validate, sort, rolling windows) at 1, 5 and 20 years
//! 2. Trailing mean and trailing sample stdev in isolation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use stocklens_core::data::RawBar;
use stocklens_core::features::{rolling, FeatureTransformer, MA_WINDOW, VOLATILITY_WINDOW};
use stocklens_core::Symbol;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_raw_bars(n: usize) -> Vec<RawBar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2005, 1, 3).unwrap();
    (0..n)
        .map(|i| {
            let close = 1_000.0 + (i as f64 * 0.1).sin() * 50.0;
            let open = close - 2.5;
            RawBar::complete(
                base_date + chrono::Duration::days(i as i64),
                open,
                close + 8.0,
                open - 8.0,
                close,
                1_000_000 + (i as u64 % 500_000),
            )
        })
        .collect()
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_transform");
    let symbol = Symbol::normalize("RELIANCE");
    let transformer = FeatureTransformer::new();

    // ~250 trading days per year
    for years in [1usize, 5, 20] {
        let bars = make_raw_bars(years * 250);
        group.bench_with_input(BenchmarkId::new("years", years), &bars, |b, bars| {
            b.iter(|| transformer.transform(black_box(&symbol), black_box(bars)))
        });
    }
    group.finish();
}

fn bench_rolling(c: &mut Criterion) {
    let mut group = c.benchmark_group("rolling");
    let values: Vec<f64> = (0..1_250).map(|i| (i as f64 * 0.37).cos() * 0.02).collect();

    group.bench_function("trailing_mean_7", |b| {
        b.iter(|| rolling::trailing_mean(black_box(&values), MA_WINDOW))
    });
    group.bench_function("trailing_sample_std_30", |b| {
        b.iter(|| rolling::trailing_sample_std(black_box(&values), VOLATILITY_WINDOW))
    });
    group.finish();
}

criterion_group!(benches, bench_transform, bench_rolling);
criterion_main!(benches);
