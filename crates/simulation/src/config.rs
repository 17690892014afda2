//! Server traffic configuration and per-slot vehicle profiles.
//!
//! `TrafficConfig` carries the global AI parameters; `VehicleProfile` the
//! per-slot tuning that normally comes from the entry list. Both deserialize
//! from JSON so a server operator can override any field; every field has a
//! default so an empty config runs.

use std::fmt;
use std::fs;
use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Global traffic parameters
// ---------------------------------------------------------------------------

/// Sphere inside which player vehicles are never treated as obstacles and
/// collision signals are ignored (pit lanes, spawn areas).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IgnoreObstacleSphere {
    pub center: [f32; 3],
    pub radius: f32,
}

impl IgnoreObstacleSphere {
    pub fn contains(&self, position: Vec3) -> bool {
        let center = Vec3::from_array(self.center);
        position.distance_squared(center) < self.radius * self.radius
    }
}

/// Safety distance bounds that replace the global ones on road sections with
/// a specific lane count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SafetyDistanceOverride {
    pub lane_count: usize,
    pub min_squared: f32,
    pub max_squared: f32,
}

#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    /// Run seed for all simulation randomness.
    pub seed: u64,
    /// Baseline AI cruise speed, m/s.
    pub max_speed: f32,
    /// Half-spread of per-spawn speed randomization, as a fraction of
    /// `max_speed`.
    pub max_speed_variation: f32,
    /// Extra speed granted on overtaking lanes, m/s.
    pub right_lane_offset: f32,
    /// Traffic density multiplier; safety distances scale with its inverse.
    pub traffic_density: f32,
    pub min_safety_distance_squared: f32,
    pub max_safety_distance_squared: f32,
    pub safety_distance_overrides: Vec<SafetyDistanceOverride>,
    pub ignore_player_obstacle_spheres: Vec<IgnoreObstacleSphere>,
    /// How long a vehicle may sit stalled behind an obstacle before it gets a
    /// temporary ignore-obstacles window to break gridlock, milliseconds.
    pub ignore_obstacles_after_ms: i64,
    /// Vertical offset added above the spline surface, meters.
    pub spline_height_offset: f32,
    /// Player-driven slots occupy board ids `0..player_slots`.
    pub player_slots: u8,
    /// AI traffic slots occupy board ids `player_slots..player_slots+ai_slots`.
    pub ai_slots: u8,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            max_speed: 80.0 / 3.6,
            max_speed_variation: 0.15,
            right_lane_offset: 10.0 / 3.6,
            traffic_density: 1.0,
            min_safety_distance_squared: 20.0 * 20.0,
            max_safety_distance_squared: 70.0 * 70.0,
            safety_distance_overrides: Vec::new(),
            ignore_player_obstacle_spheres: Vec::new(),
            ignore_obstacles_after_ms: 30_000,
            spline_height_offset: 0.0,
            player_slots: 8,
            ai_slots: 48,
        }
    }
}

impl TrafficConfig {
    pub fn total_slots(&self) -> usize {
        self.player_slots as usize + self.ai_slots as usize
    }

    /// First board slot id assigned to AI traffic.
    pub fn first_ai_slot(&self) -> u8 {
        self.player_slots
    }

    /// Safety distance bounds for a road section with `lane_count` lanes,
    /// honoring lane-count overrides and per-profile overrides, scaled by the
    /// inverse traffic density.
    pub fn safety_distance_bounds(
        &self,
        lane_count: usize,
        profile: &VehicleProfile,
    ) -> (f32, f32) {
        let (mut min, mut max) = (
            self.min_safety_distance_squared,
            self.max_safety_distance_squared,
        );

        if let Some(ovr) = self
            .safety_distance_overrides
            .iter()
            .find(|o| o.lane_count == lane_count)
        {
            min = ovr.min_squared;
            max = ovr.max_squared;
        }

        if let Some(p) = profile.min_safety_distance_squared {
            min = p;
        }
        if let Some(p) = profile.max_safety_distance_squared {
            max = p;
        }

        let density_scale = 1.0 / self.traffic_density.max(f32::EPSILON);
        (min * density_scale, max * density_scale)
    }

    /// True when `position` lies inside any configured ignore sphere.
    pub fn in_ignore_sphere(&self, position: Vec3) -> bool {
        self.ignore_player_obstacle_spheres
            .iter()
            .any(|s| s.contains(position))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&text).map_err(ConfigError::Parse)
    }
}

// ---------------------------------------------------------------------------
// Per-slot vehicle profile
// ---------------------------------------------------------------------------

/// Which lane kinds a profile is allowed to spawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaneSpawnBehavior {
    Left,
    Middle,
    Right,
}

/// Per-slot AI tuning, normally sourced from the server entry list.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleProfile {
    /// m/s².
    pub acceleration: f32,
    /// m/s², positive.
    pub deceleration: f32,
    pub cornering_speed_factor: f32,
    pub cornering_brake_distance_factor: f32,
    pub cornering_brake_force_factor: f32,
    /// Body length ahead of the reference point, meters.
    pub vehicle_length_pre: f32,
    /// Body length behind the reference point, meters.
    pub vehicle_length_post: f32,
    pub tyre_diameter: f32,
    pub idle_engine_rpm: u16,
    pub max_engine_rpm: u16,
    pub min_spawn_protection_ms: i64,
    pub max_spawn_protection_ms: i64,
    pub min_collision_stop_ms: i64,
    pub max_collision_stop_ms: i64,
    pub min_lane_count: Option<usize>,
    pub max_lane_count: Option<usize>,
    pub allowed_spawn_lanes: Option<Vec<LaneSpawnBehavior>>,
    pub min_safety_distance_squared: Option<f32>,
    pub max_safety_distance_squared: Option<f32>,
}

impl Default for VehicleProfile {
    fn default() -> Self {
        Self {
            acceleration: 2.5,
            deceleration: 8.5,
            cornering_speed_factor: 0.65,
            cornering_brake_distance_factor: 3.0,
            cornering_brake_force_factor: 1.0,
            vehicle_length_pre: 2.0,
            vehicle_length_post: 2.0,
            tyre_diameter: 0.65,
            idle_engine_rpm: 800,
            max_engine_rpm: 3000,
            min_spawn_protection_ms: 4_000,
            max_spawn_protection_ms: 8_000,
            min_collision_stop_ms: 1_000,
            max_collision_stop_ms: 3_000,
            min_lane_count: None,
            max_lane_count: None,
            allowed_spawn_lanes: None,
            min_safety_distance_squared: None,
            max_safety_distance_squared: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config file: {e}"),
            ConfigError::Parse(e) => write!(f, "failed to parse config file: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
