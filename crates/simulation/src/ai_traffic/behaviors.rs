//! Player-reactive behaviors and the lane-change state machine.

use bevy::prelude::*;
use rand::Rng;

use super::constants::*;
use super::obstacles::relative_bearing_deg;
use super::types::{AiVehicle, LaneChange};
use crate::occupancy::Occupancy;
use crate::road_graph::RoadGraph;
use crate::status::{CarStatusFlags, StatusBoard, HIGH_BEAMS_OFF, INDICATE_LEFT, INDICATE_RIGHT};

impl AiVehicle {
    /// True when another vehicle occupies the immediately adjacent lane
    /// point on either side of the current position.
    pub(crate) fn is_car_next_to_me(&self, graph: &RoadGraph, occupancy: &Occupancy) -> bool {
        let lanes = graph.lanes(self.current_point);
        if lanes.len() <= 1 {
            return false;
        }
        let index = graph.lane_index(self.current_point);
        if index > 0 && occupancy.occupant(lanes[index - 1]).is_some() {
            return true;
        }
        if index + 1 < lanes.len() && occupancy.occupant(lanes[index + 1]).is_some() {
            return true;
        }
        false
    }

    pub(crate) fn set_next_lane_change_cooldown(&mut self, rng: &mut impl Rng) {
        self.lane_change_cooldown_ms =
            rng.gen_range(MIN_LANE_CHANGE_COOLDOWN_MS..=MAX_LANE_CHANGE_COOLDOWN_MS);
    }

    /// Try to enter the Changing state toward the right (`true`) or left
    /// neighbor lane. Preconditions are checked up front; failing any of
    /// them leaves the machine in Idle untouched.
    pub(crate) fn try_lane_change(
        &mut self,
        to_right: bool,
        graph: &RoadGraph,
        occupancy: &Occupancy,
        rng: &mut impl Rng,
    ) {
        if self.lane_change.is_changing() {
            return;
        }
        if self.is_car_next_to_me(graph, occupancy) {
            return;
        }

        let lanes = graph.lanes(self.current_point);
        if lanes.len() <= 1 {
            return;
        }
        let current_lane = graph.lane_index(self.current_point);
        let target_lane = if to_right {
            current_lane + 1
        } else {
            match current_lane.checked_sub(1) {
                Some(lane) => lane,
                None => return,
            }
        };
        if target_lane >= lanes.len() {
            return;
        }

        // Both lanes must continue at the next point or the interpolation
        // has nothing to aim at.
        let next = self.route.next(graph, rng, self.current_point);
        let Some(next) = u32::try_from(next).ok() else {
            return;
        };
        let next_lanes = graph.lanes(next);
        if current_lane >= next_lanes.len() || target_lane >= next_lanes.len() {
            return;
        }

        self.lane_change = LaneChange::Changing {
            start_lane: current_lane,
            target_lane,
            progress: 0.0,
        };
        self.indicator = if to_right { INDICATE_RIGHT } else { INDICATE_LEFT };
    }

    /// Advance an active lane change by one tick. Returns the replacement
    /// world position while changing; `None` when Idle (or just aborted).
    ///
    /// Commits exactly when progress first reaches 1: the registered point
    /// moves to the target lane, the indicator clears and the deviation
    /// phase is re-rolled.
    pub(crate) fn update_lane_change(
        &mut self,
        dt_seconds: f32,
        tangent: Vec3,
        graph: &RoadGraph,
        occupancy: &Occupancy,
        slot: u8,
        rng: &mut impl Rng,
    ) -> Option<Vec3> {
        let LaneChange::Changing {
            start_lane,
            target_lane,
            progress,
        } = self.lane_change
        else {
            return None;
        };

        let progress = (progress + dt_seconds / self.lane_change_duration_s.max(f32::EPSILON))
            .min(1.0);

        let lanes = graph.lanes(self.current_point);
        if start_lane >= lanes.len() || target_lane >= lanes.len() {
            // Lane indices went stale mid-change: abort without committing.
            self.lane_change = LaneChange::Idle;
            return None;
        }

        let start_pos = graph.point(lanes[start_lane]).position;
        let target_pos = graph.point(lanes[target_lane]).position;
        let base = start_pos.lerp(target_pos, progress) + tangent * self.segment_progress;

        if progress >= 1.0 {
            self.lane_change = LaneChange::Idle;
            self.set_current_point(occupancy, slot, lanes[target_lane]);
            self.indicator = CarStatusFlags::NONE;
            self.deviation.phase = rng.gen::<f32>() * std::f32::consts::TAU;
        } else {
            self.lane_change = LaneChange::Changing {
                start_lane,
                target_lane,
                progress,
            };
        }

        Some(base)
    }

    /// Track rising edges of nearby players' high beams; three flashes
    /// within the rolling window request a lane change in a random
    /// direction.
    pub(crate) fn handle_player_flash(
        &mut self,
        now_ms: i64,
        board: &StatusBoard,
        graph: &RoadGraph,
        occupancy: &Occupancy,
        rng: &mut impl Rng,
    ) {
        let own = self.status;
        let mut request = None;

        for (player_slot, entry) in board.players() {
            if entry.status.position.distance(own.position) >= FLASH_DETECT_RADIUS {
                continue;
            }
            let bearing = relative_bearing_deg(&own, &entry.status);
            if !(bearing > 360.0 - FLASH_CONE_HALF_DEG || bearing < FLASH_CONE_HALF_DEG) {
                continue;
            }

            let tracker = self.flash_trackers.entry(player_slot).or_default();
            let high_beams_on = !entry.status.flags.contains(HIGH_BEAMS_OFF);

            // Stale window with no qualifying edge: start over.
            if tracker.count > 0 && now_ms - tracker.first_flash_ms > FLASH_WINDOW_MS {
                tracker.count = 0;
                tracker.first_flash_ms = 0;
            }

            if high_beams_on && !tracker.last_high_beams_on {
                if tracker.count == 0 {
                    tracker.first_flash_ms = now_ms;
                }
                tracker.count += 1;

                if tracker.count >= REQUIRED_FLASHES
                    && now_ms - tracker.first_flash_ms <= FLASH_WINDOW_MS
                {
                    request = Some(rng.gen_bool(0.5));
                    tracker.count = 0;
                    tracker.first_flash_ms = 0;
                }
            }

            tracker.last_high_beams_on = high_beams_on;
        }

        if let Some(to_right) = request {
            self.try_lane_change(to_right, graph, occupancy, rng);
        }
    }

    /// Evasive nudge away from a fast player brushing past. Returns the
    /// adjusted position.
    pub(crate) fn apply_scare(
        &mut self,
        position: Vec3,
        sample_position: Vec3,
        right: Vec3,
        board: &StatusBoard,
        dt_ms: i64,
        rng: &mut impl Rng,
    ) -> Vec3 {
        let own_position = self.status.position;
        let player_nearby = board
            .players()
            .any(|(_, e)| e.status.position.distance(own_position) < SCARE_RADIUS);

        let mut factor = 0.0;
        let mut direction = self.scare.direction;

        if player_nearby {
            let closest = board.players().map(|(_, e)| e).min_by(|a, b| {
                let da = a.status.position.distance_squared(own_position);
                let db = b.status.position.distance_squared(own_position);
                da.total_cmp(&db)
            });

            if let Some(entry) = closest {
                let distance = entry.status.position.distance(own_position);
                let to_player = (entry.status.position - sample_position).normalize_or_zero();
                let side = right.dot(to_player);

                factor = ((SCARE_DISTANCE_RAMP - distance) / SCARE_DISTANCE_RAMP).clamp(0.0, 1.0)
                    * ((entry.status.speed() - SCARE_SPEED_THRESHOLD) / SCARE_SPEED_RAMP)
                        .clamp(0.0, 1.0);
                direction = if side > 0.0 { -1.0 } else { 1.0 };
            }
        }

        if factor > SCARE_FACTOR_EPSILON {
            if !self.scare.active && rng.gen_range(0..SCARE_LATCH_ODDS) == 0 {
                self.scare.active = true;
                self.scare.target = factor;
                self.scare.direction = direction;
            } else if self.scare.active {
                self.scare.target = self.scare.target.max(factor);
            }
        } else if self.scare.active {
            self.scare.active = false;
            self.scare.target = 0.0;
        }

        let fade_seconds = if self.scare.active {
            SCARE_FADE_IN_SECONDS
        } else {
            SCARE_FADE_OUT_SECONDS
        };
        let step = (dt_ms as f32 / 1000.0) / fade_seconds;
        if self.scare.fade < self.scare.target {
            self.scare.fade = (self.scare.fade + step).min(self.scare.target);
        } else if self.scare.fade > self.scare.target {
            self.scare.fade = (self.scare.fade - step).max(self.scare.target);
        }

        if self.scare.fade > 0.001 {
            let offset = (self.scare.fade * SCARE_OFFSET_GAIN).clamp(0.0, SCARE_MAX_OFFSET);
            position + right * self.scare.direction * offset
        } else {
            position
        }
    }
}
