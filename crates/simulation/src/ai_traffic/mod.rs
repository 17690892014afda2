//! The per-vehicle traffic controller.
//!
//! One entity per traffic slot: `AiVehicle` holds the full per-tick state,
//! `VehicleProfile` the per-slot tuning, `VehicleRng` the slot's random
//! stream. Each `FixedUpdate` every initialized vehicle integrates its speed
//! toward the governed target, advances along its route, evaluates the road
//! spline, applies lane-change/deviation/scare offsets and produces a
//! kinematic status snapshot; a second pass walks the lookahead and picks
//! next tick's target speed.

mod behaviors;
mod constants;
mod obstacles;
mod plugin;
mod systems;
mod types;

#[cfg(test)]
mod tests;

pub use constants::WALKING_SPEED;
pub use plugin::AiTrafficPlugin;
pub use systems::{
    govern_vehicles, handle_collision_signals, handle_spawn_requests, publish_status, spawn_slot,
    update_vehicles,
};
pub use types::{
    AiVehicle, CollisionSignal, FlashTracker, LaneChange, LaneDeviation, ScareState, Slot,
    SpawnError, SpawnRequest,
};
