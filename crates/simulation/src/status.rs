//! Kinematic status snapshots and the cross-vehicle status board.
//!
//! `CarStatus` is the only state a vehicle exposes outward: one snapshot per
//! tick, consumed by the network broadcast layer. The `StatusBoard` resource
//! republishes every slot's latest snapshot so vehicle ticks can read each
//! other (and live players) without touching another controller's state.

use bevy::prelude::*;
use bitcode::{Decode, Encode};

// ---------------------------------------------------------------------------
// Status flag bitmask
// ---------------------------------------------------------------------------

/// Bitmask of lights/signals broadcast with every snapshot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode,
)]
pub struct CarStatusFlags(pub u32);

pub const LIGHTS_ON: CarStatusFlags = CarStatusFlags(1 << 0);
pub const HIGH_BEAMS_OFF: CarStatusFlags = CarStatusFlags(1 << 1);
pub const HAZARDS_ON: CarStatusFlags = CarStatusFlags(1 << 2);
pub const BRAKE_LIGHTS_ON: CarStatusFlags = CarStatusFlags(1 << 3);
pub const HORN: CarStatusFlags = CarStatusFlags(1 << 4);
pub const WIPER_LEVEL_1: CarStatusFlags = CarStatusFlags(1 << 5);
pub const WIPER_LEVEL_2: CarStatusFlags = CarStatusFlags(1 << 6);
pub const WIPER_LEVEL_3: CarStatusFlags = CarStatusFlags(1 << 7);
pub const INDICATE_LEFT: CarStatusFlags = CarStatusFlags(1 << 8);
pub const INDICATE_RIGHT: CarStatusFlags = CarStatusFlags(1 << 9);

impl CarStatusFlags {
    pub const NONE: CarStatusFlags = CarStatusFlags(0);

    pub fn contains(self, other: CarStatusFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for CarStatusFlags {
    type Output = CarStatusFlags;

    fn bitor(self, rhs: CarStatusFlags) -> CarStatusFlags {
        CarStatusFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for CarStatusFlags {
    fn bitor_assign(&mut self, rhs: CarStatusFlags) {
        self.0 |= rhs.0;
    }
}

/// Wiper level flags for the given ambient rain intensity.
pub fn wiper_flags(rain_intensity: f32) -> CarStatusFlags {
    if rain_intensity < 0.05 {
        CarStatusFlags::NONE
    } else if rain_intensity < 0.25 {
        WIPER_LEVEL_1
    } else if rain_intensity < 0.5 {
        WIPER_LEVEL_2
    } else {
        WIPER_LEVEL_3
    }
}

// ---------------------------------------------------------------------------
// Kinematic snapshot
// ---------------------------------------------------------------------------

/// One per-tick kinematic snapshot of a vehicle slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarStatus {
    /// Server clock at snapshot time, milliseconds.
    pub timestamp: i64,
    pub position: Vec3,
    /// Yaw / pitch / roll, radians.
    pub rotation: Vec3,
    pub velocity: Vec3,
    /// Log-scaled per-tyre angular speed bytes (100 = stopped).
    pub tyre_angular_speed: [u8; 4],
    pub steer_angle: u8,
    pub wheel_angle: u8,
    pub engine_rpm: u16,
    pub gear: u8,
    pub flags: CarStatusFlags,
}

impl Default for CarStatus {
    fn default() -> Self {
        Self {
            timestamp: 0,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            velocity: Vec3::ZERO,
            tyre_angular_speed: [100; 4],
            steer_angle: 127,
            wheel_angle: 127,
            engine_rpm: 0,
            gear: 0,
            flags: CarStatusFlags::NONE,
        }
    }
}

impl CarStatus {
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    /// Heading in compass degrees, normalized to [0, 360).
    pub fn rotation_angle_deg(&self) -> f32 {
        self.rotation.x.to_degrees().rem_euclid(360.0)
    }
}

/// Encode a tyre angular speed for the wire format: log10-scaled, clamped to
/// [0, 254], with 100 meaning "stopped".
pub fn encode_tyre_angular_speed(speed: f32, tyre_diameter: f32) -> u8 {
    let angular = speed / (std::f32::consts::PI * tyre_diameter) * 6.0;
    let scaled = ((angular + 1.0).log10() * 20.0).round() * angular.signum();
    (scaled.clamp(-100.0, 154.0) + 100.0) as u8
}

/// Engine RPM interpolated between idle and max by the speed ratio.
pub fn engine_rpm(speed: f32, idle_rpm: u16, max_rpm: u16, max_speed: f32) -> u16 {
    let ratio = if max_speed > 0.0 {
        (speed / max_speed).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (idle_rpm as f32 + (max_rpm as f32 - idle_rpm as f32) * ratio) as u16
}

// ---------------------------------------------------------------------------
// Status board
// ---------------------------------------------------------------------------

/// Published per-slot state, the cross-vehicle read surface.
#[derive(Debug, Clone, Copy)]
pub struct SlotEntry {
    /// False while the slot is unspawned / disconnected.
    pub active: bool,
    /// True for player-driven slots, false for AI traffic.
    pub player: bool,
    pub status: CarStatus,
    pub current_speed: f32,
    pub target_speed: f32,
    pub safety_distance_squared: f32,
    /// Body length ahead of the reference point, meters.
    pub length_pre: f32,
    /// Body length behind the reference point, meters.
    pub length_post: f32,
}

impl Default for SlotEntry {
    fn default() -> Self {
        Self {
            active: false,
            player: false,
            status: CarStatus::default(),
            current_speed: 0.0,
            target_speed: 0.0,
            safety_distance_squared: 0.0,
            length_pre: 0.0,
            length_post: 0.0,
        }
    }
}

/// Snapshot board for all slots. AI entries are republished in PostSim after
/// every tick; player entries are ingested in PreSim from update events.
/// During the Simulation phase the board is read-only.
#[derive(Resource, Debug, Default)]
pub struct StatusBoard {
    slots: Vec<SlotEntry>,
}

impl StatusBoard {
    pub fn resize(&mut self, slot_count: usize) {
        self.slots = vec![SlotEntry::default(); slot_count];
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, slot: u8) -> Option<&SlotEntry> {
        self.slots.get(slot as usize)
    }

    pub fn publish_ai(&mut self, slot: u8, entry: SlotEntry) {
        if let Some(dst) = self.slots.get_mut(slot as usize) {
            *dst = SlotEntry {
                player: false,
                ..entry
            };
        }
    }

    pub fn publish_player(
        &mut self,
        slot: u8,
        status: CarStatus,
        length_pre: f32,
        length_post: f32,
    ) {
        if let Some(dst) = self.slots.get_mut(slot as usize) {
            *dst = SlotEntry {
                active: true,
                player: true,
                status,
                current_speed: status.speed(),
                target_speed: status.speed(),
                safety_distance_squared: 0.0,
                length_pre,
                length_post,
            };
        }
    }

    pub fn clear_slot(&mut self, slot: u8) {
        if let Some(dst) = self.slots.get_mut(slot as usize) {
            *dst = SlotEntry::default();
        }
    }

    /// Active player slots.
    pub fn players(&self) -> impl Iterator<Item = (u8, &SlotEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, e)| e.active && e.player)
            .map(|(i, e)| (i as u8, e))
    }

    /// Active slots of any kind.
    pub fn active(&self) -> impl Iterator<Item = (u8, &SlotEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, e)| e.active)
            .map(|(i, e)| (i as u8, e))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
