//! Benchmarks for chart building and signal scanning.

use std::sync::atomic::AtomicBool;

use candlescan::prelude::*;
use chrono::{Days, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal::Decimal;

/// Generate realistic random bars
fn generate_bars(symbol: &str, n: usize) -> Vec<Ohlc> {
  let start = NaiveDate::from_ymd_opt(2000, 1, 3).unwrap();
  let mut bars = Vec::with_capacity(n);
  let mut price = Decimal::from(100);

  for i in 0..n {
    let change = Decimal::new(((i * 7 + 13) % 100) as i64 - 50, 2); // Deterministic "random"
    let volatility = Decimal::new(100 + ((i * 3) % 10) as i64 * 20, 2);

    let o = price;
    let c = (price + change).max(Decimal::TEN);
    let h = o.max(c) + volatility / Decimal::TWO;
    let l = o.min(c) - volatility / Decimal::TWO;

    let date = start + Days::new(i as u64);
    bars.push(Ohlc::new(symbol, date, o, h, l, c, 1000 + (i as u64 % 17) * 100).unwrap());
    price = c;
  }

  bars
}

fn build_chart(symbol: &str, n: usize) -> Chart {
  ChartBuilder::new(ChartInfo::new(symbol, Interval::Daily), generate_bars(symbol, n))
    .trend(Trend::parse("S50C").unwrap())
    .build()
    .unwrap()
}

fn bench_chart_build(c: &mut Criterion) {
  let bars = generate_bars("SYM", 1000);
  let ma = MovingAverageKey::parse("E20C").unwrap();
  let trend: Trend = CombinedWeightedTrend::new(vec![
    WeightedTrend::new(Trend::parse("S20C").unwrap(), Decimal::ONE).unwrap(),
    WeightedTrend::new(Trend::parse("X10").unwrap(), Decimal::TWO).unwrap(),
  ])
  .into();

  c.bench_function("build_chart_1000_bars", |b| {
    b.iter(|| {
      let chart = ChartBuilder::new(ChartInfo::new("SYM", Interval::Daily), black_box(bars.clone()))
        .moving_average(ma)
        .trend(trend.clone())
        .build();
      let _ = black_box(chart);
    })
  });
}

fn bench_aggregation(c: &mut Criterion) {
  let bars = generate_bars("SYM", 5000);

  c.bench_function("aggregate_weekly_5000_bars", |b| {
    b.iter(|| {
      let _ = black_box(aggregate_to(black_box(&bars), Interval::Weekly));
    })
  });
}

fn bench_single_signal(c: &mut Criterion) {
  let chart = build_chart("SYM", 1000);
  let hammer = find_signal("Hammer").unwrap();

  c.bench_function("discover_hammer_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(hammer.discover_matches(black_box(&chart), None, false));
    })
  });
}

fn bench_library(c: &mut Criterion) {
  let mut group = c.benchmark_group("library");

  for size in [100, 500, 1000, 5000].iter() {
    let chart = build_chart("SYM", *size);

    group.bench_with_input(BenchmarkId::new("discover", size), size, |b, _| {
      b.iter(|| {
        for signal in library() {
          let _ = black_box(signal.discover_matches(black_box(&chart), None, false));
        }
      })
    });
  }

  group.finish();
}

fn bench_parallel_scan(c: &mut Criterion) {
  let charts: Vec<Chart> =
    ["SYM1", "SYM2", "SYM3", "SYM4"].iter().map(|symbol| build_chart(symbol, 1000)).collect();
  let market = build_chart("INDEX", 1000);
  let cancel = AtomicBool::new(false);

  c.bench_function("parallel_scan_4_instruments", |b| {
    b.iter(|| {
      let _ = black_box(scan_parallel(library(), black_box(&charts), Some(&market), &cancel));
    })
  });
}

criterion_group!(
  benches,
  bench_chart_build,
  bench_aggregation,
  bench_single_signal,
  bench_library,
  bench_parallel_scan,
);

criterion_main!(benches);
