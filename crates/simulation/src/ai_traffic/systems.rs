//! Vehicle lifecycle, motion integration and the tick systems.

use bevy::prelude::*;
use rand::Rng;

use super::constants::*;
use super::types::{AiVehicle, CollisionSignal, LaneChange, ScareState, Slot, SpawnError, SpawnRequest};
use crate::clock::SimClock;
use crate::config::{LaneSpawnBehavior, TrafficConfig, VehicleProfile};
use crate::occupancy::Occupancy;
use crate::physics;
use crate::road_graph::{RoadGraph, NO_ID};
use crate::sim_rng::{SimRng, VehicleRng};
use crate::status::{
    encode_tyre_angular_speed, engine_rpm, wiper_flags, CarStatus, CarStatusFlags, SlotEntry,
    StatusBoard, BRAKE_LIGHTS_ON, HAZARDS_ON, HIGH_BEAMS_OFF, HORN, LIGHTS_ON,
};
use crate::weather::Weather;

/// How many points the spawn eligibility scan walks to find neighbors.
const SPAWN_SCAN_POINTS: usize = 50;

// ---------------------------------------------------------------------------
// Movement and lifecycle
// ---------------------------------------------------------------------------

impl AiVehicle {
    /// Move the registered occupancy to a new point. Enter-then-leave so a
    /// follower scanning the registry never sees a gap.
    pub(crate) fn set_current_point(&mut self, occupancy: &Occupancy, slot: u8, point_id: u32) {
        if point_id == self.current_point {
            return;
        }
        occupancy.enter(point_id, slot);
        occupancy.leave(self.current_point, slot);
        self.current_point = point_id;
    }

    /// Re-derive the Hermite tangents for the current segment. Fails only
    /// when the route has no forward continuation.
    pub(crate) fn calculate_tangents(&mut self, graph: &RoadGraph, rng: &mut impl Rng) -> bool {
        let Some(next) = self.route.try_next(graph, rng, self.current_point, 1) else {
            return false;
        };
        let next_position = graph.point(next).position;
        let current_position = graph.point(self.current_point).position;

        self.start_tangent = match self.route.try_previous(graph, self.current_point) {
            Some(previous) => (next_position - graph.point(previous).position) * 0.5,
            None => (next_position - current_position) * 0.5,
        };
        self.end_tangent = match self.route.try_next(graph, rng, self.current_point, 2) {
            Some(two_ahead) => (graph.point(two_ahead).position - current_position) * 0.5,
            None => (next_position - current_position) * 0.5,
        };
        true
    }

    /// Advance along the route to the given absolute segment progress,
    /// crossing as many segments as the distance covers. Returns false when
    /// the route ends (the caller despawns).
    pub(crate) fn advance(
        &mut self,
        target_progress: f32,
        graph: &RoadGraph,
        occupancy: &Occupancy,
        slot: u8,
        rng: &mut impl Rng,
    ) -> bool {
        let mut progress = target_progress;
        let mut crossed = false;
        let mut hops = 0;

        while progress > self.segment_length {
            hops += 1;
            if hops > graph.len() {
                return false;
            }
            progress -= self.segment_length;

            let Some(next) = self.route.try_next(graph, rng, self.current_point, 1) else {
                return false;
            };
            let Some(next_next) = self.route.try_next(graph, rng, next, 1) else {
                return false;
            };

            self.set_current_point(occupancy, slot, next);
            self.segment_length = graph
                .point(next_next)
                .position
                .distance(graph.point(next).position);
            crossed = true;

            if self.junction_passed {
                self.remaining_indicate_distance -= self.segment_length;
                if self.remaining_indicate_distance < 0.0 {
                    self.indicator = CarStatusFlags::NONE;
                    self.junction_passed = false;
                    self.remaining_indicate_distance = 0.0;
                }
            }

            if self.pending_junction >= 0
                && graph.point(self.current_point).junction_end_id == self.pending_junction
            {
                if let Some(junction) = graph.junction(self.pending_junction) {
                    self.junction_passed = true;
                    self.remaining_indicate_distance = junction.indicate_distance_post;
                }
                self.pending_junction = NO_ID;
            }
        }

        if crossed && !self.calculate_tangents(graph, rng) {
            return false;
        }
        self.segment_progress = progress;
        true
    }

    fn set_random_speed(&mut self, config: &TrafficConfig, graph: &RoadGraph, rng: &mut impl Rng) {
        let variation = config.max_speed * config.max_speed_variation;
        let fast_lane_offset = if graph.point(self.current_point).has_left() {
            config.right_lane_offset
        } else {
            0.0
        };
        self.initial_max_speed =
            config.max_speed + fast_lane_offset - variation / 2.0 + rng.gen::<f32>() * variation;
        self.current_speed = self.initial_max_speed;
        self.target_speed = self.initial_max_speed;
        self.max_speed = self.initial_max_speed;
    }

    /// Spawn eligibility: lane-count constraints, allowed-lane membership
    /// and safety distances against the nearest registered neighbors.
    pub(crate) fn can_spawn(
        &self,
        profile: &VehicleProfile,
        graph: &RoadGraph,
        point_id: u32,
        previous: Option<&SlotEntry>,
        next: Option<&SlotEntry>,
    ) -> bool {
        let Some(point) = graph.try_point(point_id as i32) else {
            return false;
        };

        let lane_count = graph.lanes(point_id).len();
        if profile.min_lane_count.is_some_and(|min| lane_count < min) {
            return false;
        }
        if profile.max_lane_count.is_some_and(|max| lane_count > max) {
            return false;
        }

        if let Some(allowed) = &profile.allowed_spawn_lanes {
            let allowed_here = (allowed.contains(&LaneSpawnBehavior::Middle)
                && point.has_left()
                && point.has_right())
                || (allowed.contains(&LaneSpawnBehavior::Left) && !point.has_left())
                || (allowed.contains(&LaneSpawnBehavior::Right) && !point.has_right());
            if !allowed_here {
                return false;
            }
        }

        if let Some(prev) = previous {
            let clearance = (point.position.distance(prev.status.position)
                - prev.length_pre
                - profile.vehicle_length_post)
                .max(0.0);
            let clearance_squared = clearance * clearance;
            if clearance_squared < prev.safety_distance_squared
                || clearance_squared < self.safety_distance_squared
            {
                return false;
            }
        }
        if let Some(ahead) = next {
            let clearance = (point.position.distance(ahead.status.position)
                - ahead.length_post
                - profile.vehicle_length_pre)
                .max(0.0);
            let clearance_squared = clearance * clearance;
            if clearance_squared < ahead.safety_distance_squared
                || clearance_squared < self.safety_distance_squared
            {
                return false;
            }
        }

        true
    }

    /// (Re)spawn at a road-graph point: reset route memory, seed the segment
    /// state and re-randomize the per-spawn parameters. The first update
    /// runs in the same tick's Simulation phase with dt = 0.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn spawn(
        &mut self,
        point_id: u32,
        slot: u8,
        profile: &VehicleProfile,
        config: &TrafficConfig,
        graph: &RoadGraph,
        occupancy: &Occupancy,
        now_ms: i64,
        rng: &mut impl Rng,
    ) -> Result<(), SpawnError> {
        if graph.try_point(point_id as i32).is_none() {
            return Err(SpawnError::PointOutOfRange(point_id));
        }

        self.route.clear();

        let old_point = self.current_point;
        occupancy.enter(point_id, slot);
        if old_point != point_id {
            occupancy.leave(old_point, slot);
        }
        self.current_point = point_id;

        let next = self
            .route
            .try_next(graph, rng, point_id, 1)
            .ok_or(SpawnError::Topology(point_id))?;
        self.segment_length = graph
            .point(next)
            .position
            .distance(graph.point(point_id).position);
        self.segment_progress = 0.0;
        if !self.calculate_tangents(graph, rng) {
            return Err(SpawnError::Topology(point_id));
        }

        self.set_random_speed(config, graph, rng);
        self.color = CAR_COLORS[rng.gen_range(0..CAR_COLORS.len())];

        let lane_count = graph.lanes(point_id).len();
        let (min_dist, max_dist) = config.safety_distance_bounds(lane_count, profile);
        self.safety_distance_squared = if min_dist < max_dist {
            rng.gen_range(min_dist..max_dist)
        } else {
            min_dist
        };

        self.set_next_lane_change_cooldown(rng);
        self.lane_change = LaneChange::Idle;
        self.lane_change_duration_s =
            rng.gen_range(MIN_LANE_CHANGE_DURATION_S..MAX_LANE_CHANGE_DURATION_S);
        self.last_lane_change_ms = now_ms;

        self.spawn_protection_until = now_ms
            + if profile.min_spawn_protection_ms < profile.max_spawn_protection_ms {
                rng.gen_range(profile.min_spawn_protection_ms..profile.max_spawn_protection_ms)
            } else {
                profile.min_spawn_protection_ms
            };
        self.collision_stop_until = 0;
        self.ignore_obstacles_until = 0;
        self.honk_start_ms = 0;
        self.honk_end_ms = 0;
        self.indicator = CarStatusFlags::NONE;
        self.pending_junction = NO_ID;
        self.junction_passed = false;
        self.remaining_indicate_distance = 0.0;
        self.stopped_for_obstacle = false;
        self.last_tick_ms = now_ms;
        self.min_obstacle_distance =
            rng.gen_range(MIN_OBSTACLE_DISTANCE_LOW..MIN_OBSTACLE_DISTANCE_HIGH);
        self.closest_ai_obstacle = -1.0;

        self.deviation.randomize(rng);
        self.flash_trackers.clear();
        self.scare = ScareState::default();

        self.spawn_counter = self.spawn_counter.wrapping_add(1);
        self.initialized = true;
        Ok(())
    }

    pub(crate) fn despawn(&mut self, occupancy: &Occupancy, slot: u8, rng: &mut impl Rng) {
        self.initialized = false;
        self.deviation.randomize(rng);
        occupancy.leave(self.current_point, slot);
    }

    /// One full per-tick update: speed integration, path advancement, spline
    /// evaluation, lateral offsets, player-reactive behaviors and the status
    /// snapshot.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn tick(
        &mut self,
        now_ms: i64,
        slot: u8,
        profile: &VehicleProfile,
        config: &TrafficConfig,
        graph: &RoadGraph,
        occupancy: &Occupancy,
        board: &StatusBoard,
        weather: &Weather,
        rng: &mut impl Rng,
    ) {
        if !self.initialized {
            return;
        }

        let dt_ms = now_ms - self.last_tick_ms;
        self.last_tick_ms = now_ms;
        let dt_seconds = dt_ms as f32 / 1000.0;

        self.integrate_speed(dt_seconds);

        let travel = self.current_speed * dt_seconds;
        if !self.advance(self.segment_progress + travel, graph, occupancy, slot, rng) {
            debug!("vehicle {slot} reached the end of the road network, despawning");
            self.despawn(occupancy, slot, rng);
            return;
        }
        let Some(next_point) = self.route.try_next(graph, rng, self.current_point, 1) else {
            debug!("vehicle {slot} reached the end of the road network, despawning");
            self.despawn(occupancy, slot, rng);
            return;
        };

        let t = if self.segment_length > 0.0 {
            self.segment_progress / self.segment_length
        } else {
            0.0
        };
        let segment_start = graph.point(self.current_point).position;
        let segment_end = graph.point(next_point).position;
        let sample = physics::catmull_rom(
            segment_start,
            segment_end,
            self.start_tangent,
            self.end_tangent,
            t,
        );

        let forward = (segment_end - segment_start).normalize_or_zero();
        let right = Vec3::Y.cross(forward).normalize_or_zero();

        self.handle_player_flash(now_ms, board, graph, occupancy, rng);

        if !self.lane_change.is_changing()
            && now_ms - self.last_lane_change_ms > self.lane_change_cooldown_ms
            && rng.gen_bool(LANE_CHANGE_CHANCE)
        {
            let to_right = rng.gen_bool(0.5);
            self.try_lane_change(to_right, graph, occupancy, rng);
            self.last_lane_change_ms = now_ms;
            self.set_next_lane_change_cooldown(rng);
        }

        let mut position = sample.position;
        if !self.lane_change.is_changing() {
            position += right * self.deviation.offset(now_ms);
        }
        if let Some(base) =
            self.update_lane_change(dt_seconds, sample.tangent, graph, occupancy, slot, rng)
        {
            position = base;
        }

        let rotation = Vec3::new(
            sample.tangent.z.atan2(sample.tangent.x) - std::f32::consts::FRAC_PI_2,
            -(Vec2::new(sample.tangent.z, sample.tangent.x)
                .length()
                .atan2(sample.tangent.y)
                - std::f32::consts::FRAC_PI_2),
            graph.camber_at(self.current_point, t),
        );

        position = self.apply_scare(position, sample.position, right, board, dt_ms, rng);

        let mut flags = LIGHTS_ON | HIGH_BEAMS_OFF | wiper_flags(weather.rain_intensity) | self.indicator;
        if now_ms < self.collision_stop_until || self.current_speed < HAZARDS_SPEED_THRESHOLD {
            flags |= HAZARDS_ON;
        }
        if self.current_speed == 0.0 || self.acceleration < 0.0 {
            flags |= BRAKE_LIGHTS_ON;
        }
        if self.stopped_for_obstacle && now_ms > self.honk_start_ms && now_ms < self.honk_end_ms {
            flags |= HORN;
        }

        let encoded_tyre = encode_tyre_angular_speed(self.current_speed, profile.tyre_diameter);

        self.status = CarStatus {
            timestamp: now_ms,
            position: Vec3::new(
                position.x,
                sample.position.y + config.spline_height_offset,
                position.z,
            ),
            rotation,
            velocity: sample.tangent * self.current_speed,
            tyre_angular_speed: [encoded_tyre; 4],
            steer_angle: 127,
            wheel_angle: 127,
            engine_rpm: engine_rpm(
                self.current_speed,
                profile.idle_engine_rpm,
                profile.max_engine_rpm,
                config.max_speed,
            ),
            gear: CRUISE_GEAR,
            flags,
        };
    }
}

// ---------------------------------------------------------------------------
// Entity setup
// ---------------------------------------------------------------------------

/// Create the entity for one AI traffic slot, uninitialized until a
/// `SpawnRequest` arrives.
pub fn spawn_slot(
    commands: &mut Commands,
    slot: u8,
    profile: VehicleProfile,
    rng: &SimRng,
) -> Entity {
    commands
        .spawn((
            Slot(slot),
            AiVehicle::new(),
            profile,
            VehicleRng(rng.vehicle_stream(slot)),
        ))
        .id()
}

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

/// First occupied neighbor point along the static lane chain.
fn nearest_occupant(
    graph: &RoadGraph,
    occupancy: &Occupancy,
    board: &StatusBoard,
    start: u32,
    own_slot: u8,
    forward: bool,
) -> Option<SlotEntry> {
    let mut cursor = start as i32;
    for _ in 0..SPAWN_SCAN_POINTS {
        let point = graph.try_point(cursor)?;
        cursor = if forward { point.next_id } else { point.prev_id };
        if cursor < 0 {
            return None;
        }
        if let Some(slot) = occupancy.occupant(cursor as u32) {
            if slot != own_slot {
                return board.get(slot).filter(|e| e.active).copied();
            }
        }
    }
    None
}

pub fn handle_spawn_requests(
    mut requests: EventReader<SpawnRequest>,
    mut vehicles: Query<(&Slot, &mut AiVehicle, &VehicleProfile, &mut VehicleRng)>,
    graph: Res<RoadGraph>,
    config: Res<TrafficConfig>,
    occupancy: Res<Occupancy>,
    board: Res<StatusBoard>,
    clock: Res<SimClock>,
) {
    for request in requests.read() {
        let Ok((slot, mut vehicle, profile, mut rng)) = vehicles.get_mut(request.entity) else {
            warn!("spawn request for unknown vehicle entity {:?}", request.entity);
            continue;
        };

        let behind = nearest_occupant(&graph, &occupancy, &board, request.point_id, slot.0, false);
        let ahead = nearest_occupant(&graph, &occupancy, &board, request.point_id, slot.0, true);
        if !vehicle.can_spawn(profile, &graph, request.point_id, behind.as_ref(), ahead.as_ref()) {
            debug!("vehicle {} may not spawn at point {}", slot.0, request.point_id);
            continue;
        }

        if let Err(error) = vehicle.spawn(
            request.point_id,
            slot.0,
            profile,
            &config,
            &graph,
            &occupancy,
            clock.now_ms(),
            &mut rng.0,
        ) {
            warn!("vehicle {} failed to spawn: {error}", slot.0);
        }
    }
}

pub fn handle_collision_signals(
    mut signals: EventReader<CollisionSignal>,
    mut vehicles: Query<(&mut AiVehicle, &VehicleProfile, &mut VehicleRng)>,
    config: Res<TrafficConfig>,
    clock: Res<SimClock>,
) {
    for signal in signals.read() {
        if let Ok((mut vehicle, profile, mut rng)) = vehicles.get_mut(signal.entity) {
            if vehicle.initialized {
                vehicle.stop_for_collision(clock.now_ms(), &config, profile, &mut rng.0);
            }
        }
    }
}

/// Motion phase: every initialized vehicle integrates speed, advances along
/// its route and produces this tick's status snapshot. Controllers tick in
/// parallel; all cross-vehicle reads go through the (immutable) board and
/// the atomic occupancy registry.
pub fn update_vehicles(
    mut vehicles: Query<(&Slot, &mut AiVehicle, &VehicleProfile, &mut VehicleRng)>,
    graph: Res<RoadGraph>,
    config: Res<TrafficConfig>,
    occupancy: Res<Occupancy>,
    board: Res<StatusBoard>,
    weather: Res<Weather>,
    clock: Res<SimClock>,
) {
    let now_ms = clock.now_ms();
    let graph = &*graph;
    let config = &*config;
    let occupancy = &*occupancy;
    let board = &*board;
    let weather = &*weather;

    vehicles
        .par_iter_mut()
        .for_each(|(slot, mut vehicle, profile, mut rng)| {
            vehicle.tick(
                now_ms, slot.0, profile, config, graph, occupancy, board, weather, &mut rng.0,
            );
        });
}

/// Governance phase: the lookahead walk and target-speed selection for next
/// tick, applied after all vehicles have moved.
pub fn govern_vehicles(
    mut vehicles: Query<(&Slot, &mut AiVehicle, &VehicleProfile, &mut VehicleRng)>,
    graph: Res<RoadGraph>,
    config: Res<TrafficConfig>,
    occupancy: Res<Occupancy>,
    board: Res<StatusBoard>,
    clock: Res<SimClock>,
) {
    let now_ms = clock.now_ms();
    let graph = &*graph;
    let config = &*config;
    let occupancy = &*occupancy;
    let board = &*board;

    vehicles
        .par_iter_mut()
        .for_each(|(slot, mut vehicle, profile, mut rng)| {
            vehicle.detect_obstacles(
                now_ms, graph, occupancy, board, config, profile, slot.0, &mut rng.0,
            );
        });
}

/// Publish every vehicle's fresh snapshot to the board for the broadcast
/// layer and the next tick's cross-vehicle reads.
pub fn publish_status(
    vehicles: Query<(&Slot, &AiVehicle, &VehicleProfile)>,
    mut board: ResMut<StatusBoard>,
) {
    for (slot, vehicle, profile) in &vehicles {
        board.publish_ai(
            slot.0,
            SlotEntry {
                active: vehicle.initialized,
                player: false,
                status: vehicle.status,
                current_speed: vehicle.current_speed,
                target_speed: vehicle.target_speed,
                safety_distance_squared: vehicle.safety_distance_squared,
                length_pre: profile.vehicle_length_pre,
                length_post: profile.vehicle_length_post,
            },
        );
    }
}
