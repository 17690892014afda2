//! Synthetic road graph construction.
//!
//! Track generators for tests, benches and the demo server: straight
//! multi-lane roads, closed ring roads, and hand-placed junctions. Real
//! deployments load a prebuilt graph through the binary cache instead.

use bevy::math::Vec3;

use super::types::{RoadJunction, RoadPoint, NO_ID};
use super::RoadGraph;
use crate::status::CarStatusFlags;

/// Lateral spacing between parallel lanes, meters.
const LANE_WIDTH: f32 = 4.0;

#[derive(Debug, Default)]
pub struct RoadGraphBuilder {
    points: Vec<RoadPoint>,
    junctions: Vec<RoadJunction>,
}

impl RoadGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parallel straight lanes along +X. Lane 0 is the leftmost (smallest
    /// Z). Each lane ends openly: reaching its last point despawns the
    /// vehicle.
    pub fn straight(lanes: usize, points_per_lane: usize, spacing: f32) -> Self {
        let mut builder = Self::new();
        for lane in 0..lanes {
            for i in 0..points_per_lane {
                let id = (lane * points_per_lane + i) as i32;
                let last_in_lane = i + 1 == points_per_lane;
                builder.points.push(RoadPoint {
                    position: Vec3::new(i as f32 * spacing, 0.0, lane as f32 * LANE_WIDTH),
                    length: spacing,
                    next_id: if last_in_lane { NO_ID } else { id + 1 },
                    prev_id: if i == 0 { NO_ID } else { id - 1 },
                    left_id: if lane == 0 {
                        NO_ID
                    } else {
                        id - points_per_lane as i32
                    },
                    right_id: if lane + 1 == lanes {
                        NO_ID
                    } else {
                        id + points_per_lane as i32
                    },
                    ..RoadPoint::default()
                });
            }
        }
        builder
    }

    /// Closed circular lanes around the origin. Lane 0 is the innermost.
    /// `radius` feeds the per-point curvature used by cornering governance.
    pub fn ring(lanes: usize, points_per_lane: usize, radius: f32) -> Self {
        let mut builder = Self::new();
        for lane in 0..lanes {
            let lane_radius = radius + lane as f32 * LANE_WIDTH;
            for i in 0..points_per_lane {
                let id = (lane * points_per_lane + i) as i32;
                let angle = i as f32 / points_per_lane as f32 * std::f32::consts::TAU;
                let segment =
                    std::f32::consts::TAU * lane_radius / points_per_lane as f32;
                builder.points.push(RoadPoint {
                    position: Vec3::new(
                        lane_radius * angle.cos(),
                        0.0,
                        lane_radius * angle.sin(),
                    ),
                    radius: lane_radius,
                    length: segment,
                    next_id: if i + 1 == points_per_lane {
                        (lane * points_per_lane) as i32
                    } else {
                        id + 1
                    },
                    prev_id: if i == 0 {
                        (lane * points_per_lane + points_per_lane - 1) as i32
                    } else {
                        id - 1
                    },
                    left_id: if lane == 0 {
                        NO_ID
                    } else {
                        id - points_per_lane as i32
                    },
                    right_id: if lane + 1 == lanes {
                        NO_ID
                    } else {
                        id + points_per_lane as i32
                    },
                    ..RoadPoint::default()
                });
            }
        }
        builder
    }

    /// Override the curvature radius of one point.
    pub fn with_radius(mut self, point_id: u32, radius: f32) -> Self {
        if let Some(point) = self.points.get_mut(point_id as usize) {
            point.radius = radius;
        }
        self
    }

    /// Override the camber of one point.
    pub fn with_camber(mut self, point_id: u32, camber: f32) -> Self {
        if let Some(point) = self.points.get_mut(point_id as usize) {
            point.camber = camber;
        }
        self
    }

    /// Add a branch from `start_point` to `end_point`. Marks the start
    /// point's `junction_start_id`; end-boundary points must be marked
    /// separately with [`mark_junction_end`](Self::mark_junction_end).
    #[allow(clippy::too_many_arguments)]
    pub fn with_junction(
        mut self,
        start_point: u32,
        end_point: u32,
        probability: f32,
        indicate_distance_pre: f32,
        indicate_distance_post: f32,
        indicate_when_taken: CarStatusFlags,
        indicate_when_not_taken: CarStatusFlags,
    ) -> Self {
        let junction_id = self.junctions.len() as i32;
        self.junctions.push(RoadJunction {
            start_point_id: start_point as i32,
            end_point_id: end_point as i32,
            probability,
            indicate_distance_pre,
            indicate_distance_post,
            indicate_when_taken,
            indicate_when_not_taken,
        });
        if let Some(point) = self.points.get_mut(start_point as usize) {
            point.junction_start_id = junction_id;
        }
        self
    }

    /// Mark a point as an end boundary of the given junction. Both
    /// continuations of a fork may carry the same junction id.
    pub fn mark_junction_end(mut self, point_id: u32, junction_id: i32) -> Self {
        if let Some(point) = self.points.get_mut(point_id as usize) {
            point.junction_end_id = junction_id;
        }
        self
    }

    pub fn build(self) -> RoadGraph {
        RoadGraph {
            points: self.points,
            junctions: self.junctions,
        }
    }
}
