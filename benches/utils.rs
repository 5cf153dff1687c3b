//! 工具函数性能基准测试

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use flash_offers::utils::{Coordinates, distance_km, generate_redemption_token, normalize_token};

// ============== distance_km 基准测试 ==============

fn bench_distance_km(c: &mut Criterion) {
    let mut group = c.benchmark_group("utils/distance_km");

    let origin = Coordinates::new(40.7128, -74.0060);
    let cases = [
        ("same_point", origin),
        ("across_town", Coordinates::new(40.7580, -73.9855)),
        ("cross_country", Coordinates::new(34.0522, -118.2437)),
        ("antipodal", Coordinates::new(-40.7128, 105.9940)),
    ];

    for (name, target) in cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), &target, |b, target| {
            b.iter(|| distance_km(black_box(origin), black_box(*target)));
        });
    }

    // 附近查询时对每个场馆计算一次距离
    let venues: Vec<Coordinates> = (0..1000)
        .map(|i| Coordinates::new(40.0 + (i as f64) * 0.001, -74.0 + (i as f64) * 0.001))
        .collect();
    group.bench_function("filter_1000_venues", |b| {
        b.iter(|| {
            venues
                .iter()
                .filter(|v| distance_km(origin, **v) <= 5.0)
                .count()
        });
    });

    group.finish();
}

// ============== token 基准测试 ==============

fn bench_generate_token(c: &mut Criterion) {
    let mut group = c.benchmark_group("utils/generate_redemption_token");

    group.bench_function("single", |b| {
        b.iter(generate_redemption_token);
    });

    group.bench_function("batch_100", |b| {
        b.iter(|| {
            (0..100)
                .map(|_| generate_redemption_token())
                .collect::<Vec<_>>()
        });
    });

    group.finish();
}

fn bench_normalize_token(c: &mut Criterion) {
    let mut group = c.benchmark_group("utils/normalize_token");

    let inputs = [
        ("canonical", "K7QM-4TZP"),
        ("lowercase_compact", "k7qm4tzp"),
        ("padded", "  k7qm - 4tzp  "),
        ("invalid_symbol", "K7QM-4TZ0"),
        ("too_long", "K7QM-4TZP-XXXX"),
    ];

    for (name, input) in inputs {
        group.bench_with_input(BenchmarkId::from_parameter(name), input, |b, input| {
            b.iter(|| normalize_token(black_box(input)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_distance_km,
    bench_generate_token,
    bench_normalize_token
);
criterion_main!(benches);
