//! Lookahead, obstacle selection and speed governance.

use bevy::prelude::*;
use rand::Rng;

use super::constants::*;
use super::types::AiVehicle;
use crate::config::{TrafficConfig, VehicleProfile};
use crate::occupancy::Occupancy;
use crate::physics;
use crate::road_graph::RoadGraph;
use crate::status::{CarStatus, CarStatusFlags, StatusBoard};

/// Bearing of `other` relative to `own`'s heading, degrees in [0, 360).
/// 0 means directly behind `own`, 180 directly ahead.
pub(crate) fn relative_bearing_deg(own: &CarStatus, other: &CarStatus) -> f32 {
    let mut bearing = (own.position.x - other.position.x)
        .atan2(own.position.z - other.position.z)
        .to_degrees();
    if bearing < 0.0 {
        bearing += 360.0;
    }
    (bearing + own.rotation_angle_deg()).rem_euclid(360.0)
}

/// Horizontal unit vector for a yaw angle.
pub(crate) fn heading_vector(yaw: f32) -> Vec3 {
    let angle = yaw + std::f32::consts::FRAC_PI_2;
    Vec3::new(angle.cos(), 0.0, angle.sin())
}

/// Everything one lookahead walk produced. The junction fields are the
/// walk's only write set; `detect_obstacles` applies them in one place.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LookaheadResult {
    /// First occupied point in forward walk order: (slot, clearance meters).
    pub closest_ai: Option<(u8, f32)>,
    /// Cornering speed ceiling, m/s.
    pub max_speed: f32,
    /// Junction to latch: (junction id, indicator flags).
    pub junction: Option<(i32, CarStatusFlags)>,
}

impl AiVehicle {
    /// Walk the route ahead up to twice the braking distance plus margin,
    /// collecting the first occupied point, the nearest indicating junction
    /// and the cornering speed ceiling.
    ///
    /// Obstacle selection deliberately keeps walk order, not global
    /// distance order; the tuning of the whole governance chain depends on
    /// it.
    pub(crate) fn spline_lookahead(
        &mut self,
        graph: &RoadGraph,
        occupancy: &Occupancy,
        board: &StatusBoard,
        profile: &VehicleProfile,
        own_slot: u8,
        rng: &mut impl Rng,
    ) -> LookaheadResult {
        let mut result = LookaheadResult {
            closest_ai: None,
            max_speed: f32::MAX,
            junction: None,
        };

        let max_braking =
            physics::braking_distance(self.current_speed, profile.deceleration) * 2.0
                + LOOKAHEAD_MARGIN;
        let speed_squared = self.current_speed * self.current_speed;
        let mut junction_found = false;
        let mut distance = 0.0;
        let mut point_id = self.current_point;
        let mut hops = 0;

        while distance < max_braking {
            // Bounded by the graph size so degenerate zero-length loops
            // cannot spin forever.
            hops += 1;
            if hops > graph.len() {
                break;
            }

            distance += graph.point(point_id).length;
            let next = self.route.next(graph, rng, point_id);
            if next < 0 {
                break;
            }
            point_id = next as u32;
            let point = graph.point(point_id);

            if !junction_found && point.junction_start_id >= 0 {
                if let Some(junction) = graph.junction(point.junction_start_id) {
                    if distance < junction.indicate_distance_pre {
                        let flags = if self.route.will_take_junction(
                            graph,
                            rng,
                            point.junction_start_id,
                        ) {
                            junction.indicate_when_taken
                        } else {
                            junction.indicate_when_not_taken
                        };
                        if !flags.is_empty() {
                            result.junction = Some((point.junction_start_id, flags));
                            junction_found = true;
                        }
                    }
                }
            }

            if result.closest_ai.is_none() {
                if let Some(slot) = occupancy.occupant(point_id) {
                    if slot != own_slot {
                        if let Some(entry) = board.get(slot).filter(|e| e.active) {
                            let clearance = (self
                                .status
                                .position
                                .distance(entry.status.position)
                                - profile.vehicle_length_pre
                                - entry.length_post)
                                .max(0.0);
                            result.closest_ai = Some((slot, clearance));
                        }
                    }
                }
            }

            let cornering_squared = physics::max_cornering_speed_squared(
                point.radius,
                profile.cornering_speed_factor,
            );
            if cornering_squared < speed_squared {
                let cornering_speed = cornering_squared.sqrt();
                let brake_needed = physics::braking_distance(
                    self.current_speed - cornering_speed,
                    profile.deceleration * profile.cornering_brake_force_factor,
                ) * profile.cornering_brake_distance_factor;
                if brake_needed > distance {
                    result.max_speed = result.max_speed.min(cornering_speed);
                }
            }
        }

        result
    }

    /// Oriented-rectangle test: does `other` overlap the forward rectangle
    /// ahead of this vehicle?
    pub(crate) fn is_obstacle(&self, other: &CarStatus) -> bool {
        let forward = heading_vector(self.status.rotation.x);
        let right = Vec3::Y.cross(forward).normalize_or_zero();

        let other_forward = heading_vector(other.rotation.x);
        let other_right = Vec3::Y.cross(other_forward).normalize_or_zero();

        let corners = [
            other.position + other_forward * OBSTACLE_HALF_LENGTH + other_right * OBSTACLE_HALF_WIDTH,
            other.position + other_forward * OBSTACLE_HALF_LENGTH - other_right * OBSTACLE_HALF_WIDTH,
            other.position - other_forward * OBSTACLE_HALF_LENGTH + other_right * OBSTACLE_HALF_WIDTH,
            other.position - other_forward * OBSTACLE_HALF_LENGTH - other_right * OBSTACLE_HALF_WIDTH,
        ];

        corners.iter().any(|corner| {
            let relative = *corner - self.status.position;
            let lateral = relative.dot(right);
            let depth = relative.dot(forward);
            lateral.abs() <= FORWARD_RECT_HALF_WIDTH
                && depth >= FORWARD_RECT_OFFSET
                && depth <= FORWARD_RECT_OFFSET + FORWARD_RECT_LENGTH
        })
    }

    /// Nearest live player inside the forward cone whose footprint actually
    /// obstructs the lane: (slot, distance).
    pub(crate) fn find_closest_player_obstacle(
        &self,
        board: &StatusBoard,
        config: &TrafficConfig,
    ) -> Option<(u8, f32)> {
        if config.in_ignore_sphere(self.status.position) {
            return None;
        }

        let mut best: Option<(u8, f32)> = None;
        for (slot, entry) in board.players() {
            let distance_squared = entry
                .status
                .position
                .distance_squared(self.status.position);
            if best.is_some_and(|(_, d2)| distance_squared >= d2) {
                continue;
            }
            let bearing = relative_bearing_deg(&self.status, &entry.status);
            if bearing > OBSTACLE_CONE_MIN_DEG
                && bearing < OBSTACLE_CONE_MAX_DEG
                && self.is_obstacle(&entry.status)
            {
                best = Some((slot, distance_squared));
            }
        }
        best.map(|(slot, d2)| (slot, d2.sqrt()))
    }

    /// Set the collision-stop window after an external collision signal,
    /// unless the vehicle sits inside an ignore sphere.
    pub(crate) fn stop_for_collision(
        &mut self,
        now_ms: i64,
        config: &TrafficConfig,
        profile: &VehicleProfile,
        rng: &mut impl Rng,
    ) {
        if config.in_ignore_sphere(self.status.position) {
            return;
        }
        let window = if profile.min_collision_stop_ms < profile.max_collision_stop_ms {
            rng.gen_range(profile.min_collision_stop_ms..profile.max_collision_stop_ms)
        } else {
            profile.min_collision_stop_ms
        };
        self.collision_stop_until = now_ms + window;
    }

    /// The governance pass: pick obstacles, apply the junction latch, track
    /// stalls and set next tick's target speed.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn detect_obstacles(
        &mut self,
        now_ms: i64,
        graph: &RoadGraph,
        occupancy: &Occupancy,
        board: &StatusBoard,
        config: &TrafficConfig,
        profile: &VehicleProfile,
        own_slot: u8,
        rng: &mut impl Rng,
    ) {
        if !self.initialized {
            return;
        }

        if now_ms < self.ignore_obstacles_until {
            self.set_target_speed_with(self.max_speed, profile.deceleration, profile.acceleration);
            return;
        }
        if now_ms < self.collision_stop_until {
            self.set_target_speed_with(0.0, profile.deceleration, profile.acceleration);
            return;
        }

        let lookahead = self.spline_lookahead(graph, occupancy, board, profile, own_slot, rng);
        if let Some((junction_id, flags)) = lookahead.junction {
            // An active lane change owns the indicator until it finishes.
            if !self.lane_change.is_changing() {
                self.indicator = flags;
            }
            self.pending_junction = junction_id;
        }

        let player = self.find_closest_player_obstacle(board, config);
        let ai_distance = lookahead.closest_ai.map_or(f32::MAX, |(_, d)| d);
        let player_distance = player.map_or(f32::MAX, |(_, d)| d);
        self.closest_ai_obstacle = if lookahead.closest_ai.is_some() {
            ai_distance
        } else {
            -1.0
        };

        let mut target = self.initial_max_speed;
        let mut has_obstacle = false;

        if player_distance < self.min_obstacle_distance
            || ai_distance < self.min_obstacle_distance
        {
            target = 0.0;
            has_obstacle = true;
        } else if player_distance < ai_distance {
            if let Some(entry) = player.and_then(|(slot, _)| board.get(slot)) {
                let mut player_speed = entry.status.speed();
                if player_speed < STATIONARY_EPSILON {
                    player_speed = 0.0;
                }
                if (player_speed < self.current_speed || player_speed == 0.0)
                    && player_distance
                        < physics::braking_distance(
                            self.current_speed - player_speed,
                            profile.deceleration,
                        ) * 2.0
                            + LOOKAHEAD_MARGIN
                {
                    target = WALKING_SPEED.max(player_speed);
                    has_obstacle = true;
                }
            }
        } else if let Some((slot, distance)) = lookahead.closest_ai {
            if let Some(entry) = board.get(slot).filter(|e| e.active) {
                let obstacle_speed = entry.current_speed.min(entry.target_speed);
                if (obstacle_speed < self.current_speed || entry.current_speed == 0.0)
                    && distance
                        < physics::braking_distance(
                            self.current_speed - obstacle_speed,
                            profile.deceleration,
                        ) * 2.0
                            + LOOKAHEAD_MARGIN
                {
                    target = WALKING_SPEED.max(obstacle_speed);
                    has_obstacle = true;
                }
            }
        }

        target = target.min(lookahead.max_speed);

        if self.current_speed == 0.0 && !self.stopped_for_obstacle {
            self.stopped_for_obstacle = true;
            self.stopped_since_ms = now_ms;
            self.honk_start_ms = now_ms + rng.gen_range(MIN_HONK_DELAY_MS..MAX_HONK_DELAY_MS);
            self.honk_end_ms =
                self.honk_start_ms + rng.gen_range(MIN_HONK_DURATION_MS..MAX_HONK_DURATION_MS);
            debug!("vehicle {own_slot} stopped for obstacle");
        } else if self.current_speed > 0.0 && self.stopped_for_obstacle {
            self.stopped_for_obstacle = false;
        } else if self.stopped_for_obstacle
            && now_ms - self.stopped_since_ms > config.ignore_obstacles_after_ms
        {
            self.ignore_obstacles_until = now_ms + GRIDLOCK_IGNORE_MS;
            debug!("vehicle {own_slot} ignoring obstacles to break gridlock");
        }

        let mut deceleration = profile.deceleration;
        if !has_obstacle {
            deceleration *= profile.cornering_brake_force_factor;
        }

        self.max_speed = self.initial_max_speed;
        self.set_target_speed_with(target, deceleration, profile.acceleration);
    }
}
