//! Per-vehicle route resolution with persistent junction choices.
//!
//! The cursor resolves "the next point along my route" over the shared road
//! graph. Whenever the route reaches a branching point it rolls the
//! junction's configured probability once and remembers the outcome, so the
//! lookahead's `will_take_junction` query and the actual crossing always
//! agree. `clear` drops the memory on spawn or teleport.

use std::collections::HashMap;

use rand::Rng;

use crate::road_graph::{RoadGraph, NO_ID};

#[derive(Debug, Clone, Default)]
pub struct RouteCursor {
    taken: HashMap<i32, bool>,
}

impl RouteCursor {
    /// Forget all junction decisions.
    pub fn clear(&mut self) {
        self.taken.clear();
    }

    /// Whether this route takes the given junction. Rolled once per junction
    /// and memoized until [`clear`](Self::clear).
    pub fn will_take_junction(
        &mut self,
        graph: &RoadGraph,
        rng: &mut impl Rng,
        junction_id: i32,
    ) -> bool {
        let Some(junction) = graph.junction(junction_id) else {
            return false;
        };
        *self
            .taken
            .entry(junction_id)
            .or_insert_with(|| rng.gen::<f32>() < junction.probability)
    }

    /// Next point along the route, or a negative id at the path end.
    /// A successor id that does not exist in the graph also reads as the
    /// path end rather than a fault.
    pub fn next(&mut self, graph: &RoadGraph, rng: &mut impl Rng, point_id: u32) -> i32 {
        let Some(point) = graph.try_point(point_id as i32) else {
            return NO_ID;
        };
        let mut candidate = point.next_id;
        if point.junction_start_id >= 0
            && self.will_take_junction(graph, rng, point.junction_start_id)
        {
            if let Some(junction) = graph.junction(point.junction_start_id) {
                candidate = junction.end_point_id;
            }
        }
        if graph.try_point(candidate).is_none() {
            return NO_ID;
        }
        candidate
    }

    /// Next point `count` steps ahead, or `None` if the route ends first.
    pub fn try_next(
        &mut self,
        graph: &RoadGraph,
        rng: &mut impl Rng,
        point_id: u32,
        count: u32,
    ) -> Option<u32> {
        let mut cursor = point_id;
        for _ in 0..count.max(1) {
            let next = self.next(graph, rng, cursor);
            if next < 0 {
                return None;
            }
            cursor = next as u32;
        }
        Some(cursor)
    }

    /// Previous point along the route. Follows a taken branch backwards when
    /// this point is the branch's end; otherwise the lane's `prev_id`.
    pub fn try_previous(&self, graph: &RoadGraph, point_id: u32) -> Option<u32> {
        let point = graph.try_point(point_id as i32)?;
        if point.junction_end_id >= 0 && self.taken.get(&point.junction_end_id) == Some(&true) {
            if let Some(junction) = graph.junction(point.junction_end_id) {
                if junction.end_point_id == point_id as i32 {
                    graph.try_point(junction.start_point_id)?;
                    return u32::try_from(junction.start_point_id).ok();
                }
            }
        }
        graph.try_point(point.prev_id)?;
        u32::try_from(point.prev_id).ok()
    }
}
