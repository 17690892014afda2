//! Headless traffic server runner.
//!
//! Usage: `app [config.json] [graph.rdg]`
//!
//! Without arguments the server runs a demo two-lane ring road with the
//! default config. Set `TRAFFIC_GRAPH_EXPORT=<path>` to write the selected
//! road graph as a binary cache and exit (useful to seed real deployments).

use std::path::Path;
use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;

use simulation::ai_traffic::{spawn_slot, SpawnRequest};
use simulation::config::{TrafficConfig, VehicleProfile};
use simulation::occupancy::Occupancy;
use simulation::road_graph::{self, RoadGraph, RoadGraphBuilder};
use simulation::sim_rng::SimRng;
use simulation::status::StatusBoard;
use simulation::{init_boards, SimulationPlugin, SimulationSet, TickCounter};

fn main() {
    let mut args = std::env::args().skip(1);

    let config = match args.next() {
        Some(path) => match TrafficConfig::load(Path::new(&path)) {
            Ok(config) => config,
            Err(error) => {
                eprintln!("{error}; using the default config");
                TrafficConfig::default()
            }
        },
        None => TrafficConfig::default(),
    };

    let graph = match args.next() {
        Some(path) => match road_graph::load(Path::new(&path)) {
            Ok(graph) => graph,
            Err(error) => {
                eprintln!("{error}; falling back to the demo ring road");
                demo_graph()
            }
        },
        None => demo_graph(),
    };

    if let Ok(path) = std::env::var("TRAFFIC_GRAPH_EXPORT") {
        if let Err(error) = road_graph::save(&graph, Path::new(&path)) {
            eprintln!("failed to export road graph: {error}");
            std::process::exit(1);
        }
        println!("road graph written to {path}");
        return;
    }

    App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(
            Duration::from_millis(2),
        )))
        .add_plugins(LogPlugin::default())
        .insert_resource(config)
        .insert_resource(graph)
        .add_plugins(SimulationPlugin)
        .add_systems(Startup, spawn_traffic.after(init_boards))
        .add_systems(
            FixedUpdate,
            report_traffic.in_set(SimulationSet::PostSim),
        )
        .run();
}

/// Two-lane ring road used when no graph cache is provided.
fn demo_graph() -> RoadGraph {
    RoadGraphBuilder::ring(2, 512, 800.0).build()
}

/// Create one entity per AI slot and queue everyone's first spawn, spread
/// evenly around the graph.
fn spawn_traffic(
    mut commands: Commands,
    mut requests: EventWriter<SpawnRequest>,
    graph: Res<RoadGraph>,
    config: Res<TrafficConfig>,
    rng: Res<SimRng>,
) {
    if graph.is_empty() || config.ai_slots == 0 {
        warn!("no road graph points or AI slots configured, nothing to spawn");
        return;
    }

    let stride = (graph.len() / config.ai_slots as usize).max(1);
    for index in 0..config.ai_slots {
        let slot = config.first_ai_slot() + index;
        let entity = spawn_slot(&mut commands, slot, VehicleProfile::default(), &rng);
        let point_id = (index as usize * stride % graph.len()) as u32;
        requests.send(SpawnRequest { entity, point_id });
    }
    info!("queued {} traffic spawns", config.ai_slots);
}

/// One-line status report every ~10 seconds of simulation time.
fn report_traffic(
    tick: Res<TickCounter>,
    board: Res<StatusBoard>,
    occupancy: Res<Occupancy>,
) {
    if !tick.0.is_multiple_of(300) || tick.0 == 0 {
        return;
    }

    let mut active = 0usize;
    let mut speed_sum = 0.0f32;
    for (_, entry) in board.active().filter(|(_, e)| !e.player) {
        active += 1;
        speed_sum += entry.current_speed;
    }
    let mean_speed = if active > 0 {
        speed_sum / active as f32
    } else {
        0.0
    };

    info!(
        "tick {}: {} AI vehicles active, {} points occupied, mean speed {:.1} m/s",
        tick.0,
        active,
        occupancy.occupied_count(),
        mean_speed
    );
}
