use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;
use sim_core::{BuildingKind, GridPos, SimConfig};
use std::time::Duration;

fn build_session(n_buildings: i32) -> sim_runtime::Session {
    let cfg = SimConfig {
        starting_credits: Decimal::from(1_000_000_000i64),
        starting_fuel: Decimal::from(1_000_000i64),
        ..SimConfig::default()
    };
    let mut session = sim_runtime::Session::new(cfg, Duration::ZERO).unwrap();
    for i in 0..n_buildings {
        let kind = BuildingKind::ALL[(i % 5) as usize];
        session
            .try_place(kind, GridPos::new(i % 64, i / 64))
            .unwrap();
    }
    session
}

fn bench_ticks(c: &mut Criterion) {
    let mut session = build_session(500);
    let mut now = Duration::ZERO;
    c.bench_function("economy_tick_500_buildings", |b| {
        b.iter(|| {
            now += Duration::from_secs(1);
            black_box(session.tick(now))
        })
    });
}

fn bench_placement(c: &mut Criterion) {
    c.bench_function("place_and_reset_200", |b| {
        let mut session = build_session(0);
        b.iter(|| {
            for i in 0..200 {
                let _ = black_box(session.try_place(BuildingKind::Turret, GridPos::new(i, 0)));
            }
            session.reset(Duration::ZERO);
        })
    });
}

criterion_group!(benches, bench_ticks, bench_placement);
criterion_main!(benches);
