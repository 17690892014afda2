//! Immutable road network graph.
//!
//! Loaded (or generated) once at startup and read-only during simulation.
//! Vehicles never walk this structure directly for routing decisions — that
//! goes through their `RouteCursor` — but the lane grouping and camber
//! queries here back the lane-change machinery and spline evaluation.

mod builder;
mod cache;
mod types;


pub use builder::RoadGraphBuilder;
pub use cache::{decode, encode, load, save, GraphCacheError};
pub use types::{RoadJunction, RoadPoint, NO_ID};

use bevy::prelude::*;

#[derive(Resource, Debug, Default)]
pub struct RoadGraph {
    pub points: Vec<RoadPoint>,
    pub junctions: Vec<RoadJunction>,
}

impl RoadGraph {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, id: u32) -> &RoadPoint {
        &self.points[id as usize]
    }

    pub fn try_point(&self, id: i32) -> Option<&RoadPoint> {
        usize::try_from(id).ok().and_then(|i| self.points.get(i))
    }

    pub fn junction(&self, id: i32) -> Option<&RoadJunction> {
        usize::try_from(id).ok().and_then(|i| self.junctions.get(i))
    }

    /// Ordered point ids across parallel lanes sharing this longitudinal
    /// position, leftmost first. Always contains `point_id` itself.
    pub fn lanes(&self, point_id: u32) -> Vec<u32> {
        let mut leftmost = point_id;
        let mut hops = 0;
        while let Some(point) = self.try_point(leftmost as i32) {
            if !point.has_left() || hops >= self.points.len() {
                break;
            }
            leftmost = point.left_id as u32;
            hops += 1;
        }

        let mut lanes = Vec::new();
        let mut cursor = leftmost as i32;
        while let Some(point) = self.try_point(cursor) {
            lanes.push(cursor as u32);
            if lanes.len() >= self.points.len().max(1) {
                break;
            }
            cursor = point.right_id;
            if cursor < 0 {
                break;
            }
        }
        lanes
    }

    /// Index of this point within its lane group (0 = leftmost lane).
    pub fn lane_index(&self, point_id: u32) -> usize {
        self.lanes(point_id)
            .iter()
            .position(|&id| id == point_id)
            .unwrap_or(0)
    }

    /// Camber interpolated along the segment starting at `point_id`.
    pub fn camber_at(&self, point_id: u32, t: f32) -> f32 {
        let Some(point) = self.try_point(point_id as i32) else {
            return 0.0;
        };
        match self.try_point(point.next_id) {
            Some(next) => point.camber + (next.camber - point.camber) * t.clamp(0.0, 1.0),
            None => point.camber,
        }
    }
}
