//! Vehicle controller state and events.

use std::collections::HashMap;
use std::fmt;

use bevy::prelude::*;
use rand::Rng;

use super::constants::*;
use crate::road_graph::NO_ID;
use crate::route::RouteCursor;
use crate::status::{CarStatus, CarStatusFlags};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Ask a traffic slot to (re)spawn at a road-graph point.
#[derive(Event, Debug, Clone, Copy)]
pub struct SpawnRequest {
    pub entity: Entity,
    pub point_id: u32,
}

/// External collision signal for one vehicle (a player ran into it).
#[derive(Event, Debug, Clone, Copy)]
pub struct CollisionSignal {
    pub entity: Entity,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Stable board slot id of a vehicle entity.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot(pub u8);

// ---------------------------------------------------------------------------
// Sub-state
// ---------------------------------------------------------------------------

/// Lane-change state machine.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LaneChange {
    #[default]
    Idle,
    Changing {
        start_lane: usize,
        target_lane: usize,
        /// Normalized progress in [0, 1].
        progress: f32,
    },
}

impl LaneChange {
    pub fn is_changing(&self) -> bool {
        matches!(self, LaneChange::Changing { .. })
    }
}

/// High-beam flash tracking for one observed player.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlashTracker {
    pub last_high_beams_on: bool,
    pub count: u32,
    pub first_flash_ms: i64,
}

/// Evasive lateral-nudge episode state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScareState {
    pub active: bool,
    /// Current fade level in [0, 1].
    pub fade: f32,
    pub target: f32,
    /// Chosen lateral direction, -1 or 1.
    pub direction: f32,
}

/// Sinusoidal lane-noise parameters, re-rolled on every despawn.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaneDeviation {
    pub phase: f32,
    pub speed: f32,
    pub amplitude: f32,
}

impl LaneDeviation {
    pub fn randomize(&mut self, rng: &mut impl Rng) {
        self.phase = rng.gen::<f32>() * std::f32::consts::TAU;
        self.speed =
            (DEVIATION_SPEED_BASE + rng.gen::<f32>() * DEVIATION_SPEED_SPREAD) * DEVIATION_SPEED_SCALE;
        self.amplitude = DEVIATION_AMPLITUDE_BASE + rng.gen::<f32>() * DEVIATION_AMPLITUDE_SPREAD;
    }

    /// Lateral offset at the given clock time, meters.
    pub fn offset(&self, now_ms: i64) -> f32 {
        (self.phase + now_ms as f32 * 0.001 * self.speed * std::f32::consts::TAU).sin()
            * self.amplitude
    }
}

// ---------------------------------------------------------------------------
// The controller component
// ---------------------------------------------------------------------------

/// Full per-tick state of one AI traffic vehicle.
///
/// Exactly one system mutates a given instance per tick; everything another
/// vehicle may read of it goes through the status board.
#[derive(Component, Debug)]
pub struct AiVehicle {
    /// False while unspawned / despawned.
    pub initialized: bool,
    /// Latest produced snapshot, republished to the board in PostSim.
    pub status: CarStatus,
    pub route: RouteCursor,

    // Path position.
    pub current_point: u32,
    /// Distance along the current segment, `0 <= progress < length`.
    pub segment_progress: f32,
    pub segment_length: f32,
    pub start_tangent: Vec3,
    pub end_tangent: Vec3,

    // Speed profile.
    pub current_speed: f32,
    pub target_speed: f32,
    pub max_speed: f32,
    pub initial_max_speed: f32,
    /// Signed; negative brakes, zero cruises. Always points `current_speed`
    /// toward `target_speed`.
    pub acceleration: f32,

    // Safety envelope, randomized per spawn.
    pub safety_distance_squared: f32,
    pub min_obstacle_distance: f32,

    // Lane change.
    pub lane_change: LaneChange,
    pub lane_change_duration_s: f32,
    pub lane_change_cooldown_ms: i64,
    pub last_lane_change_ms: i64,

    // Junction / indicator.
    pub indicator: CarStatusFlags,
    /// Junction latched by the lookahead; `NO_ID` when none.
    pub pending_junction: i32,
    pub junction_passed: bool,
    pub remaining_indicate_distance: f32,

    // Player-reactive state.
    pub flash_trackers: HashMap<u8, FlashTracker>,
    pub scare: ScareState,
    pub deviation: LaneDeviation,

    // Timers, server-clock milliseconds.
    pub last_tick_ms: i64,
    pub spawn_protection_until: i64,
    pub collision_stop_until: i64,
    pub ignore_obstacles_until: i64,
    pub stopped_for_obstacle: bool,
    pub stopped_since_ms: i64,
    pub honk_start_ms: i64,
    pub honk_end_ms: i64,

    pub color: [u8; 3],
    pub spawn_counter: u8,
    /// Clearance to the AI obstacle picked by the last lookahead; -1 when
    /// none was found. Diagnostic only.
    pub closest_ai_obstacle: f32,
}

impl Default for AiVehicle {
    fn default() -> Self {
        Self {
            initialized: false,
            status: CarStatus::default(),
            route: RouteCursor::default(),
            current_point: 0,
            segment_progress: 0.0,
            segment_length: 0.0,
            start_tangent: Vec3::ZERO,
            end_tangent: Vec3::ZERO,
            current_speed: 0.0,
            target_speed: 0.0,
            max_speed: 0.0,
            initial_max_speed: 0.0,
            acceleration: 0.0,
            safety_distance_squared: 20.0 * 20.0,
            min_obstacle_distance: MIN_OBSTACLE_DISTANCE_LOW,
            lane_change: LaneChange::Idle,
            lane_change_duration_s: MIN_LANE_CHANGE_DURATION_S,
            lane_change_cooldown_ms: MIN_LANE_CHANGE_COOLDOWN_MS,
            last_lane_change_ms: 0,
            indicator: CarStatusFlags::NONE,
            pending_junction: NO_ID,
            junction_passed: false,
            remaining_indicate_distance: 0.0,
            flash_trackers: HashMap::new(),
            scare: ScareState::default(),
            deviation: LaneDeviation::default(),
            last_tick_ms: 0,
            spawn_protection_until: 0,
            collision_stop_until: 0,
            ignore_obstacles_until: 0,
            stopped_for_obstacle: false,
            stopped_since_ms: 0,
            honk_start_ms: 0,
            honk_end_ms: 0,
            color: CAR_COLORS[0],
            spawn_counter: 0,
            closest_ai_obstacle: -1.0,
        }
    }
}

impl AiVehicle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_spawn_protected(&self, now_ms: i64) -> bool {
        now_ms < self.spawn_protection_until
    }

    /// Set the governed target speed, choosing the acceleration sign that
    /// moves `current_speed` toward it.
    pub fn set_target_speed_with(&mut self, speed: f32, deceleration: f32, acceleration: f32) {
        self.target_speed = speed;
        if speed < self.current_speed {
            self.acceleration = -deceleration;
        } else if speed > self.current_speed {
            self.acceleration = acceleration;
        } else {
            self.acceleration = 0.0;
        }
    }

    /// Integrate speed linearly over `dt`; snaps exactly to the target when
    /// crossing it and resets acceleration.
    pub fn integrate_speed(&mut self, dt_seconds: f32) {
        if self.acceleration == 0.0 {
            return;
        }
        self.current_speed += self.acceleration * dt_seconds;
        if (self.acceleration < 0.0 && self.current_speed < self.target_speed)
            || (self.acceleration > 0.0 && self.current_speed > self.target_speed)
        {
            self.current_speed = self.target_speed;
            self.acceleration = 0.0;
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Spawning failed; the vehicle stays uninitialized.
#[derive(Debug, PartialEq, Eq)]
pub enum SpawnError {
    /// The requested point id is not part of the graph.
    PointOutOfRange(u32),
    /// The graph has no forward continuation where one is required.
    Topology(u32),
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::PointOutOfRange(id) => {
                write!(f, "spawn point {id} is outside the road graph")
            }
            SpawnError::Topology(id) => {
                write!(f, "no next point after spawn point {id}")
            }
        }
    }
}

impl std::error::Error for SpawnError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
