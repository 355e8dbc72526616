//! Benchmarks for data processing operations
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lasecplot::protocol::shape::parse_shape_value;
use lasecplot::protocol::variable::{parse_variable_line, PointBatch};
use lasecplot::{ManualClock, Origin, Series, Session, TelemetryKind};

const NOW: f64 = 1_700_000_000.0;

fn batch_line(points: usize) -> String {
    let items: Vec<String> = (0..points)
        .map(|i| format!("{}:{}", 1_700_000_000_000u64 + i as u64, (i as f64 * 0.1).sin()))
        .collect();
    format!("sensor:{}§V", items.join(";"))
}

fn bench_variable_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("variable_parsing");

    group.bench_function("single_value", |b| {
        b.iter(|| parse_variable_line(black_box("temp:21.5§°C"), NOW))
    });

    for size in [10, 100, 1000].iter() {
        let line = batch_line(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("batch", size), &line, |b, line| {
            b.iter(|| parse_variable_line(black_box(line), NOW))
        });
    }

    group.finish();
}

fn bench_shape_parsing(c: &mut Criterion) {
    c.bench_function("shape_value", |b| {
        b.iter(|| parse_shape_value(black_box("1500:S:cube:P:1:2:3:R:0:0.5:0:C:red:O:0.5"), NOW))
    });
}

fn bench_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("eviction");

    for size in [1000, 10_000, 100_000].iter() {
        let mut series = Series::new(TelemetryKind::Number);
        series.append_batch(PointBatch::Number {
            times: (0..*size).map(|i| i as f64 * 0.01).collect(),
            values: (0..*size).map(|i| i as f64).collect(),
        });

        group.bench_with_input(BenchmarkId::new("half_window", size), &series, |b, series| {
            let window = *size as f64 * 0.005;
            b.iter_batched(
                || series.clone(),
                |mut s| s.evict_before_window(black_box(window)),
                criterion::BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

fn bench_ingest_and_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest_and_tick");

    for channels in [1, 10, 50].iter() {
        let payload: String = (0..*channels)
            .map(|i| format!(">ch{}:{}\n", i, i))
            .collect();
        group.throughput(Throughput::Elements(*channels as u64));
        group.bench_with_input(BenchmarkId::new("frame", channels), &payload, |b, payload| {
            let clock = ManualClock::new(NOW * 1000.0);
            let mut session = Session::with_clock(clock.clone());
            session.set_view_duration("10");
            b.iter(|| {
                session.ingest(black_box(payload), None, Origin::Udp);
                clock.advance(40.0);
                session.tick()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_variable_parsing,
    bench_shape_parsing,
    bench_eviction,
    bench_ingest_and_tick
);
criterion_main!(benches);
