//! Criterion benchmarks for the AI traffic tick.
//!
//! Benchmarks:
//!   - full_tick/20:   one fixed tick with 20 vehicles on a two-lane ring
//!   - full_tick/200:  one fixed tick with 200 vehicles
//!
//! Budget: a full tick for 200 vehicles must fit comfortably inside the
//! ~33 ms fixed timestep; in practice it should be well under 2 ms.
//!
//! Run with: cargo bench -p simulation --features bench --bench ai_tick_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use simulation::config::TrafficConfig;
use simulation::road_graph::RoadGraphBuilder;
use simulation::test_harness::TestTrack;

fn build_track(vehicles: u8) -> TestTrack {
    let config = TrafficConfig {
        player_slots: 0,
        ai_slots: vehicles,
        min_safety_distance_squared: 4.0,
        max_safety_distance_squared: 16.0,
        ..TrafficConfig::default()
    };
    let mut track = TestTrack::with_config(
        RoadGraphBuilder::ring(2, 2048, 2000.0).build(),
        config,
    );

    for slot in 0..vehicles {
        let entity = track.add_vehicle(slot);
        track.request_spawn(entity, slot as u32 * 10);
    }
    // Let the spawn wave settle before measuring steady-state ticks.
    track.tick(5);
    track
}

fn bench_full_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("ai_traffic_tick");
    group.sample_size(50);

    for &vehicles in &[20u8, 200u8] {
        let mut track = build_track(vehicles);
        group.bench_with_input(
            BenchmarkId::new("full_tick", vehicles),
            &vehicles,
            |b, _| {
                b.iter(|| {
                    track.tick(1);
                    black_box(track.clock_ms());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_full_tick);
criterion_main!(benches);
