//! # TestTrack — headless integration test harness
//!
//! Wraps `bevy::app::App` + `SimulationPlugin` with a synthetic road graph
//! so integration tests and benches can spawn traffic, inject player state
//! and advance the fixed-timestep simulation without a real server loop.

use std::time::Duration;

use bevy::app::App;
use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;

use crate::ai_traffic::{AiVehicle, CollisionSignal, Slot, SpawnRequest};
use crate::clock::SimClock;
use crate::config::{TrafficConfig, VehicleProfile};
use crate::occupancy::Occupancy;
use crate::players::PlayerStatusUpdate;
use crate::road_graph::{RoadGraph, RoadGraphBuilder};
use crate::sim_rng::{SimRng, VehicleRng};
use crate::status::{CarStatus, StatusBoard};
use crate::weather::Weather;
use crate::{SimulationPlugin, TICK_RATE_HZ};

pub struct TestTrack {
    app: App,
}

impl TestTrack {
    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    pub fn new(graph: RoadGraph) -> Self {
        Self::with_config(graph, TrafficConfig::default())
    }

    pub fn with_config(graph: RoadGraph, config: TrafficConfig) -> Self {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.insert_resource(graph);
        app.insert_resource(config);
        app.add_plugins(SimulationPlugin);

        // Decouple the clock from wall time: every `app.update()` advances
        // exactly one fixed step, making runs deterministic.
        app.insert_resource(TimeUpdateStrategy::ManualDuration(
            Duration::from_secs_f64(1.0 / TICK_RATE_HZ),
        ));

        // Run Startup so the boards are sized before the first tick.
        app.update();
        Self { app }
    }

    /// Open-ended parallel straight lanes along +X.
    pub fn straight(lanes: usize, points_per_lane: usize, spacing: f32) -> Self {
        Self::new(RoadGraphBuilder::straight(lanes, points_per_lane, spacing).build())
    }

    /// Closed ring road; vehicles circulate forever.
    pub fn ring(lanes: usize, points_per_lane: usize, radius: f32) -> Self {
        Self::new(RoadGraphBuilder::ring(lanes, points_per_lane, radius).build())
    }

    // -----------------------------------------------------------------------
    // Setup
    // -----------------------------------------------------------------------

    /// Create an (uninitialized) AI vehicle entity for a slot.
    pub fn add_vehicle(&mut self, slot: u8) -> Entity {
        self.add_vehicle_with_profile(slot, VehicleProfile::default())
    }

    pub fn add_vehicle_with_profile(&mut self, slot: u8, profile: VehicleProfile) -> Entity {
        let rng = *self.app.world().resource::<SimRng>();
        self.app
            .world_mut()
            .spawn((
                Slot(slot),
                AiVehicle::new(),
                profile,
                VehicleRng(rng.vehicle_stream(slot)),
            ))
            .id()
    }

    /// Queue a spawn request, applied in the next tick's PreSim phase.
    pub fn request_spawn(&mut self, entity: Entity, point_id: u32) {
        self.app
            .world_mut()
            .send_event(SpawnRequest { entity, point_id });
    }

    /// Create a vehicle and spawn it at a point (one tick passes).
    pub fn spawn_vehicle(&mut self, slot: u8, point_id: u32) -> Entity {
        let entity = self.add_vehicle(slot);
        self.request_spawn(entity, point_id);
        self.tick(1);
        entity
    }

    /// Publish a player snapshot (applied next tick).
    pub fn send_player(&mut self, slot: u8, status: CarStatus) {
        self.app.world_mut().send_event(PlayerStatusUpdate {
            slot,
            status,
            length_pre: 2.0,
            length_post: 2.0,
            connected: true,
        });
    }

    pub fn disconnect_player(&mut self, slot: u8) {
        self.app.world_mut().send_event(PlayerStatusUpdate {
            slot,
            status: CarStatus::default(),
            length_pre: 0.0,
            length_post: 0.0,
            connected: false,
        });
    }

    pub fn signal_collision(&mut self, entity: Entity) {
        self.app.world_mut().send_event(CollisionSignal { entity });
    }

    pub fn set_rain(&mut self, intensity: f32) {
        self.app.world_mut().resource_mut::<Weather>().rain_intensity = intensity;
    }

    // -----------------------------------------------------------------------
    // Ticking
    // -----------------------------------------------------------------------

    /// Advance `n` fixed simulation ticks.
    pub fn tick(&mut self, n: u32) {
        for _ in 0..n {
            self.app.update();
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn world_mut(&mut self) -> &mut World {
        self.app.world_mut()
    }

    pub fn vehicle(&self, entity: Entity) -> &AiVehicle {
        self.app
            .world()
            .get::<AiVehicle>(entity)
            .expect("entity has an AiVehicle component")
    }

    /// Mutate a vehicle's state directly (test setup shortcut).
    pub fn edit_vehicle(&mut self, entity: Entity, edit: impl FnOnce(&mut AiVehicle)) {
        let mut vehicle = self
            .app
            .world_mut()
            .get_mut::<AiVehicle>(entity)
            .expect("entity has an AiVehicle component");
        edit(&mut vehicle);
    }

    pub fn clock_ms(&self) -> i64 {
        self.app.world().resource::<SimClock>().now_ms()
    }

    pub fn board(&self) -> &StatusBoard {
        self.app.world().resource::<StatusBoard>()
    }

    pub fn occupancy(&self) -> &Occupancy {
        self.app.world().resource::<Occupancy>()
    }

    pub fn graph(&self) -> &RoadGraph {
        self.app.world().resource::<RoadGraph>()
    }

    pub fn config(&self) -> &TrafficConfig {
        self.app.world().resource::<TrafficConfig>()
    }
}
