//! Plugin registration for the AI traffic core.

use bevy::prelude::*;

use super::systems::{
    govern_vehicles, handle_collision_signals, handle_spawn_requests, publish_status,
    update_vehicles,
};
use super::types::{CollisionSignal, SpawnRequest};
use crate::players::ingest_player_updates;
use crate::SimulationSet;

pub struct AiTrafficPlugin;

impl Plugin for AiTrafficPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<SpawnRequest>()
            .add_event::<CollisionSignal>()
            .add_systems(
                FixedUpdate,
                (handle_spawn_requests, handle_collision_signals)
                    .chain()
                    .after(ingest_player_updates)
                    .in_set(SimulationSet::PreSim),
            )
            .add_systems(
                FixedUpdate,
                (update_vehicles, govern_vehicles)
                    .chain()
                    .in_set(SimulationSet::Simulation),
            )
            .add_systems(FixedUpdate, publish_status.in_set(SimulationSet::PostSim));
    }
}
