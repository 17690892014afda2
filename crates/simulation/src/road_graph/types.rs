//! Road network node and junction records.

use bevy::math::Vec3;

use crate::status::CarStatusFlags;

/// Sentinel for "no linked point / no junction".
pub const NO_ID: i32 = -1;

/// One sampled point of a traffic lane.
///
/// Points form singly-branching chains via `next_id`; parallel lanes link
/// sideways via `left_id`/`right_id`. A point may start or end a junction.
#[derive(Debug, Clone, Copy)]
pub struct RoadPoint {
    pub position: Vec3,
    /// Curvature radius at this point, meters. Large values mean straight.
    pub radius: f32,
    /// Length of the segment from this point to `next_id`, meters.
    pub length: f32,
    /// Roll angle of the road surface at this point, radians.
    pub camber: f32,
    pub next_id: i32,
    pub prev_id: i32,
    pub left_id: i32,
    pub right_id: i32,
    pub junction_start_id: i32,
    pub junction_end_id: i32,
}

impl Default for RoadPoint {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            radius: 1000.0,
            length: 0.0,
            camber: 0.0,
            next_id: NO_ID,
            prev_id: NO_ID,
            left_id: NO_ID,
            right_id: NO_ID,
            junction_start_id: NO_ID,
            junction_end_id: NO_ID,
        }
    }
}

impl RoadPoint {
    pub fn has_left(&self) -> bool {
        self.left_id >= 0
    }

    pub fn has_right(&self) -> bool {
        self.right_id >= 0
    }
}

/// A branching connection between two points.
///
/// Taking the junction means leaving `start_point_id` toward
/// `end_point_id` instead of the start point's `next_id`. Points where a
/// branch terminates carry this junction's id in `junction_end_id`; both
/// continuations of a fork may do so.
#[derive(Debug, Clone, Copy)]
pub struct RoadJunction {
    pub start_point_id: i32,
    pub end_point_id: i32,
    /// Probability that a vehicle takes the branch, in [0, 1].
    pub probability: f32,
    /// Distance before the junction over which the indicator is shown.
    pub indicate_distance_pre: f32,
    /// Distance after the junction over which the indicator persists.
    pub indicate_distance_post: f32,
    pub indicate_when_taken: CarStatusFlags,
    pub indicate_when_not_taken: CarStatusFlags,
}
