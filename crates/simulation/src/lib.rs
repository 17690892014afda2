use bevy::prelude::*;

pub mod ai_traffic;
pub mod clock;
pub mod config;
pub mod occupancy;
pub mod physics;
pub mod players;
pub mod road_graph;
pub mod route;
pub mod sim_rng;
pub mod simulation_sets;
pub mod status;
pub mod weather;

#[cfg(any(test, feature = "bench"))]
pub mod test_harness;

pub use simulation_sets::SimulationSet;

use clock::SimClock;
use config::TrafficConfig;
use occupancy::Occupancy;
use road_graph::RoadGraph;
use sim_rng::SimRng;
use status::StatusBoard;
use weather::Weather;

/// Fixed server tick rate, Hz.
pub const TICK_RATE_HZ: f64 = 30.0;

// ---------------------------------------------------------------------------
// Core resources
// ---------------------------------------------------------------------------

/// Global tick counter incremented each `FixedUpdate`; used for throttled
/// reporting, never for simulation decisions.
#[derive(Resource, Default)]
pub struct TickCounter(pub u64);

pub fn count_tick(mut tick: ResMut<TickCounter>) {
    tick.0 = tick.0.wrapping_add(1);
}

/// Sizes the occupancy registry and the status board from the loaded road
/// graph and config, and applies the configured run seed. Startup systems
/// that spawn traffic must run `.after()` this.
pub fn init_boards(
    graph: Res<RoadGraph>,
    config: Res<TrafficConfig>,
    mut occupancy: ResMut<Occupancy>,
    mut board: ResMut<StatusBoard>,
    mut rng: ResMut<SimRng>,
) {
    occupancy.resize_for(graph.len());
    board.resize(config.total_slots());
    *rng = SimRng::from_seed_u64(config.seed);
    info!(
        "traffic simulation ready: {} road points, {} junctions, {} slots",
        graph.len(),
        graph.junctions.len(),
        config.total_slots()
    );
}

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(Time::<Fixed>::from_hz(TICK_RATE_HZ));

        app.init_resource::<TickCounter>()
            .init_resource::<SimClock>()
            .init_resource::<SimRng>()
            .init_resource::<TrafficConfig>()
            .init_resource::<RoadGraph>()
            .init_resource::<Occupancy>()
            .init_resource::<StatusBoard>()
            .init_resource::<Weather>();

        app.configure_sets(
            FixedUpdate,
            (
                SimulationSet::PreSim,
                SimulationSet::Simulation,
                SimulationSet::PostSim,
            )
                .chain(),
        );

        app.add_event::<players::PlayerStatusUpdate>();

        app.add_systems(Startup, init_boards);
        app.add_systems(
            FixedUpdate,
            (clock::advance_clock, count_tick).in_set(SimulationSet::PreSim),
        );
        app.add_systems(
            FixedUpdate,
            players::ingest_player_updates
                .after(clock::advance_clock)
                .in_set(SimulationSet::PreSim),
        );

        app.add_plugins(ai_traffic::AiTrafficPlugin);
    }
}
