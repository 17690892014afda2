use bevy::prelude::*;

use super::constants::*;
use super::types::{AiVehicle, LaneChange};
use crate::config::TrafficConfig;
use crate::road_graph::RoadGraphBuilder;
use crate::status::{
    CarStatus, CarStatusFlags, HAZARDS_ON, HIGH_BEAMS_OFF, INDICATE_LEFT, INDICATE_RIGHT,
    LIGHTS_ON, WIPER_LEVEL_2,
};
use crate::test_harness::TestTrack;

/// First AI slot id under the default config (player slots come first).
const AI_SLOT: u8 = 8;

/// Config that lets vehicles spawn bumper to bumper.
fn close_spawn_config() -> TrafficConfig {
    TrafficConfig {
        min_safety_distance_squared: 0.25,
        max_safety_distance_squared: 0.5,
        ..TrafficConfig::default()
    }
}

/// Config that pins every spawn to exactly `speed` m/s.
fn fixed_speed_config(speed: f32) -> TrafficConfig {
    TrafficConfig {
        max_speed: speed,
        max_speed_variation: 0.0,
        right_lane_offset: 0.0,
        ..close_spawn_config()
    }
}

fn player_status(position: Vec3, velocity: Vec3, high_beams_on: bool) -> CarStatus {
    let mut flags = LIGHTS_ON;
    if !high_beams_on {
        flags |= HIGH_BEAMS_OFF;
    }
    CarStatus {
        position,
        velocity,
        flags,
        ..CarStatus::default()
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn test_spawn_occupies_exactly_one_point() {
    let mut track = TestTrack::ring(1, 64, 200.0);
    let entity = track.spawn_vehicle(AI_SLOT, 0);

    assert!(track.vehicle(entity).initialized);
    assert_eq!(track.occupancy().occupied_count(), 1);
    let point = track.vehicle(entity).current_point;
    assert_eq!(track.occupancy().occupant(point), Some(AI_SLOT));
    assert_eq!(track.vehicle(entity).spawn_counter, 1);
}

#[test]
fn test_despawn_at_path_end_unregisters() {
    // 15 m of road at ~22 m/s: gone within a second.
    let mut track = TestTrack::straight(1, 4, 5.0);
    let entity = track.spawn_vehicle(AI_SLOT, 0);
    assert!(track.vehicle(entity).initialized);

    track.tick(60);
    assert!(!track.vehicle(entity).initialized);
    assert_eq!(track.occupancy().occupied_count(), 0);
}

#[test]
fn test_spawn_rejected_out_of_range_point() {
    let mut track = TestTrack::straight(1, 4, 5.0);
    let entity = track.add_vehicle(AI_SLOT);
    track.request_spawn(entity, 999);
    track.tick(1);
    assert!(!track.vehicle(entity).initialized);
}

#[test]
fn test_spawn_rejected_when_too_close_to_neighbor() {
    // Default safety distances are tens of meters; point 1 sits 5 m from an
    // occupied point 0.
    let mut track = TestTrack::straight(1, 20, 5.0);
    let first = track.spawn_vehicle(AI_SLOT, 0);
    assert!(track.vehicle(first).initialized);

    let second = track.add_vehicle(AI_SLOT + 1);
    track.request_spawn(second, 1);
    track.tick(1);
    assert!(!track.vehicle(second).initialized);
    assert_eq!(track.occupancy().occupied_count(), 1);
}

#[test]
fn test_spawn_protection_expires() {
    let mut track = TestTrack::ring(1, 64, 200.0);
    let entity = track.spawn_vehicle(AI_SLOT, 0);

    assert!(track.vehicle(entity).is_spawn_protected(track.clock_ms()));
    track.tick(300); // 10 s, past the 4-8 s window
    assert!(!track.vehicle(entity).is_spawn_protected(track.clock_ms()));
}

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

#[test]
fn test_speed_converges_to_thirty_and_holds() {
    let mut track = TestTrack::with_config(
        RoadGraphBuilder::ring(1, 64, 200.0).build(),
        fixed_speed_config(30.0),
    );
    let entity = track.spawn_vehicle(AI_SLOT, 0);
    assert_eq!(track.vehicle(entity).initial_max_speed, 30.0);

    // Knock the speed down; governance must pull it back to exactly 30.
    track.edit_vehicle(entity, |v| {
        v.current_speed = 0.0;
        v.acceleration = 0.0;
    });
    track.tick(450); // 15 s at 2.5 m/s² covers 0 -> 30 with margin

    let vehicle = track.vehicle(entity);
    assert_eq!(vehicle.current_speed, 30.0);
    assert_eq!(vehicle.acceleration, 0.0);

    track.tick(50);
    assert_eq!(track.vehicle(entity).current_speed, 30.0);
}

#[test]
fn test_vehicle_advances_and_reregisters_occupancy() {
    let mut track = TestTrack::with_config(
        RoadGraphBuilder::ring(1, 64, 200.0).build(),
        fixed_speed_config(20.0),
    );
    let entity = track.spawn_vehicle(AI_SLOT, 0);
    let start_point = track.vehicle(entity).current_point;

    track.tick(90); // ~60 m, several segment crossings

    let vehicle = track.vehicle(entity);
    assert_ne!(vehicle.current_point, start_point);
    assert_eq!(track.occupancy().occupied_count(), 1);
    assert_eq!(
        track.occupancy().occupant(vehicle.current_point),
        Some(AI_SLOT)
    );
    assert!(vehicle.segment_progress >= 0.0);
    assert!(vehicle.segment_progress < vehicle.segment_length);
}

#[test]
fn test_cornering_caps_speed_on_tight_ring() {
    // r = 30 m: cornering limit ~13.8 m/s, well under the cruise speed.
    let mut track = TestTrack::with_config(
        RoadGraphBuilder::ring(1, 64, 30.0).build(),
        fixed_speed_config(22.0),
    );
    let entity = track.spawn_vehicle(AI_SLOT, 0);

    track.tick(200);
    let vehicle = track.vehicle(entity);
    assert!(
        vehicle.target_speed < 14.0,
        "cornering ceiling must cap the target, got {}",
        vehicle.target_speed
    );
    assert!(vehicle.current_speed < 14.5);
}

#[test]
fn test_runs_are_deterministic() {
    let run = || {
        let mut track = TestTrack::with_config(
            RoadGraphBuilder::ring(2, 64, 200.0).build(),
            close_spawn_config(),
        );
        let a = track.spawn_vehicle(AI_SLOT, 0);
        let b = track.spawn_vehicle(AI_SLOT + 1, 32);
        track.tick(120);
        (
            track.vehicle(a).status.position,
            track.vehicle(b).status.position,
            track.vehicle(a).current_speed,
        )
    };

    assert_eq!(run(), run());
}

// ---------------------------------------------------------------------------
// Obstacle governance
// ---------------------------------------------------------------------------

#[test]
fn test_vehicle_close_ahead_forces_stop() {
    let mut track = TestTrack::with_config(
        RoadGraphBuilder::straight(1, 30, 5.0).build(),
        close_spawn_config(),
    );
    let rear = track.spawn_vehicle(AI_SLOT, 0);
    let front = track.spawn_vehicle(AI_SLOT + 1, 2);
    assert!(track.vehicle(front).initialized);

    // Freeze both: the front one becomes a stationary obstacle ~5 m of
    // clearance ahead, inside the rear one's 8-13 m hard-stop distance.
    for entity in [rear, front] {
        track.edit_vehicle(entity, |v| {
            v.current_speed = 0.0;
            v.acceleration = 0.0;
            v.initial_max_speed = 0.0;
            v.max_speed = 0.0;
        });
    }
    track.tick(2);

    let vehicle = track.vehicle(rear);
    assert_eq!(vehicle.target_speed, 0.0);
    assert!(vehicle.closest_ai_obstacle >= 0.0);
    assert!(vehicle.closest_ai_obstacle < vehicle.min_obstacle_distance);
}

#[test]
fn test_slow_leader_is_matched_not_rammed() {
    let mut track = TestTrack::with_config(
        RoadGraphBuilder::ring(1, 128, 400.0).build(),
        fixed_speed_config(22.0),
    );
    let rear = track.spawn_vehicle(AI_SLOT, 0);
    // ~40 m ahead on a ~19.6 m point spacing ring.
    let front = track.spawn_vehicle(AI_SLOT + 1, 2);

    // Pin the leader to a crawl.
    track.edit_vehicle(front, |v| {
        v.current_speed = 5.0;
        v.initial_max_speed = 5.0;
        v.max_speed = 5.0;
        v.target_speed = 5.0;
        v.acceleration = 0.0;
    });
    track.tick(300);

    let vehicle = track.vehicle(rear);
    assert!(
        vehicle.current_speed < 10.0,
        "follower must brake toward the leader's speed, got {}",
        vehicle.current_speed
    );
    assert!(vehicle.current_speed >= WALKING_SPEED - 1e-3);
}

#[test]
fn test_stall_honk_and_gridlock_override() {
    let config = TrafficConfig {
        ignore_obstacles_after_ms: 500,
        ..close_spawn_config()
    };
    let mut track =
        TestTrack::with_config(RoadGraphBuilder::straight(1, 30, 5.0).build(), config);
    let rear = track.spawn_vehicle(AI_SLOT, 0);
    let front = track.spawn_vehicle(AI_SLOT + 1, 2);

    // Freeze the obstacle; the rear vehicle keeps its cruise profile but
    // starts stopped so the stall tracker latches immediately.
    track.edit_vehicle(front, |v| {
        v.current_speed = 0.0;
        v.acceleration = 0.0;
        v.initial_max_speed = 0.0;
        v.max_speed = 0.0;
    });
    track.edit_vehicle(rear, |v| {
        v.current_speed = 0.0;
        v.acceleration = 0.0;
    });
    track.tick(2);

    let vehicle = track.vehicle(rear);
    assert_eq!(vehicle.target_speed, 0.0);
    assert!(vehicle.stopped_for_obstacle);
    assert!(vehicle.honk_start_ms >= vehicle.stopped_since_ms + MIN_HONK_DELAY_MS);
    assert!(vehicle.honk_end_ms > vehicle.honk_start_ms);

    // Stalled past the configured threshold: the gridlock override arms and
    // the vehicle is released at its own max speed.
    track.tick(40);
    let vehicle = track.vehicle(rear);
    assert!(vehicle.ignore_obstacles_until > 0);
    track.tick(1);
    let vehicle = track.vehicle(rear);
    assert_eq!(vehicle.target_speed, vehicle.max_speed);
    assert!(vehicle.target_speed > 0.0);
}

#[test]
fn test_collision_stop_window() {
    let mut track = TestTrack::with_config(
        RoadGraphBuilder::ring(1, 64, 200.0).build(),
        fixed_speed_config(22.0),
    );
    let entity = track.spawn_vehicle(AI_SLOT, 0);

    track.signal_collision(entity);
    track.tick(2);

    let vehicle = track.vehicle(entity);
    assert!(vehicle.collision_stop_until > track.clock_ms() - 100);
    assert_eq!(vehicle.target_speed, 0.0);
    // Hazards are on for the whole collision-stop window.
    assert!(vehicle.status.flags.contains(HAZARDS_ON));

    // Window over (max 3 s): the vehicle resumes.
    track.tick(150);
    assert!(track.vehicle(entity).target_speed > 0.0);
}

// ---------------------------------------------------------------------------
// Junctions & indicators
// ---------------------------------------------------------------------------

#[test]
fn test_junction_indicator_latch_and_decay() {
    let graph = RoadGraphBuilder::straight(1, 40, 5.0)
        .with_junction(10, 25, 1.0, 60.0, 12.0, INDICATE_RIGHT, CarStatusFlags::NONE)
        .mark_junction_end(25, 0)
        .build();
    let mut track = TestTrack::with_config(graph, fixed_speed_config(22.0));
    let entity = track.spawn_vehicle(AI_SLOT, 5);

    let mut saw_indicator = false;
    let mut cleared_after_indicating = false;
    for _ in 0..200 {
        track.tick(1);
        let vehicle = track.vehicle(entity);
        if !vehicle.initialized {
            break;
        }
        if vehicle.indicator == INDICATE_RIGHT {
            saw_indicator = true;
        }
        if saw_indicator && vehicle.indicator == CarStatusFlags::NONE && !vehicle.junction_passed
        {
            cleared_after_indicating = true;
            break;
        }
    }

    assert!(saw_indicator, "the junction must latch the right indicator");
    assert!(
        cleared_after_indicating,
        "the indicator must clear after the post distance runs out"
    );
}

#[test]
fn test_junction_branch_is_taken_when_certain() {
    let graph = RoadGraphBuilder::straight(1, 40, 5.0)
        .with_junction(10, 25, 1.0, 60.0, 12.0, INDICATE_RIGHT, CarStatusFlags::NONE)
        .mark_junction_end(25, 0)
        .build();
    let mut track = TestTrack::with_config(graph, fixed_speed_config(22.0));
    let entity = track.spawn_vehicle(AI_SLOT, 5);

    // Walk until past the junction start; the branch must skip points 11-24.
    let mut crossed_branch = false;
    for _ in 0..120 {
        track.tick(1);
        let vehicle = track.vehicle(entity);
        if !vehicle.initialized {
            break;
        }
        if vehicle.current_point == 25 {
            crossed_branch = true;
        }
        assert!(
            !(11..=24).contains(&vehicle.current_point),
            "a certain junction must never continue straight"
        );
    }
    assert!(crossed_branch);
}

// ---------------------------------------------------------------------------
// Lane changes
// ---------------------------------------------------------------------------

#[test]
fn test_lane_change_commits_exactly_at_progress_one() {
    let mut track = TestTrack::with_config(
        RoadGraphBuilder::straight(2, 10, 5.0).build(),
        fixed_speed_config(0.0),
    );
    let entity = track.spawn_vehicle(AI_SLOT, 5);
    let lanes = track.graph().lanes(5);
    assert_eq!(lanes, vec![5, 15]);

    track.edit_vehicle(entity, |v| {
        v.lane_change = LaneChange::Changing {
            start_lane: 0,
            target_lane: 1,
            progress: 0.0,
        };
        v.indicator = INDICATE_RIGHT;
        v.lane_change_duration_s = 1.0;
    });

    // Half way: still registered on the start lane, still indicating.
    track.tick(15);
    let vehicle = track.vehicle(entity);
    assert!(vehicle.lane_change.is_changing());
    assert_eq!(vehicle.current_point, 5);
    assert_eq!(track.occupancy().occupant(5), Some(AI_SLOT));
    assert_eq!(vehicle.indicator, INDICATE_RIGHT);

    // Past the full duration: committed to the target lane, indicator off.
    track.tick(20);
    let vehicle = track.vehicle(entity);
    assert!(!vehicle.lane_change.is_changing());
    assert_eq!(vehicle.current_point, 15);
    assert_eq!(track.occupancy().occupant(15), Some(AI_SLOT));
    assert_eq!(track.occupancy().occupant(5), None);
    assert_eq!(vehicle.indicator, CarStatusFlags::NONE);
}

#[test]
fn test_lane_change_blocked_by_adjacent_vehicle() {
    let mut track = TestTrack::with_config(
        RoadGraphBuilder::straight(2, 10, 5.0).build(),
        fixed_speed_config(0.0),
    );
    let entity = track.spawn_vehicle(AI_SLOT, 5);
    let neighbor = track.spawn_vehicle(AI_SLOT + 1, 15);
    assert!(track.vehicle(neighbor).initialized);

    {
        let graph = track.graph();
        let occupancy = track.occupancy();
        assert!(track.vehicle(entity).is_car_next_to_me(graph, occupancy));
    }

    // A player flashing three times would normally trigger a change; the
    // adjacent vehicle must veto it.
    let behind = Vec3::new(25.0 - 10.0, 0.0, 0.0);
    for i in 0..6 {
        track.send_player(0, player_status(behind, Vec3::ZERO, i % 2 == 0));
        track.tick(1);
    }
    assert!(!track.vehicle(entity).lane_change.is_changing());
}

// ---------------------------------------------------------------------------
// Player-reactive behaviors
// ---------------------------------------------------------------------------

#[test]
fn test_three_flashes_trigger_lane_change() {
    // Three lanes, AI in the middle so both directions are valid.
    let mut track = TestTrack::with_config(
        RoadGraphBuilder::straight(3, 12, 5.0).build(),
        fixed_speed_config(0.0),
    );
    let entity = track.spawn_vehicle(AI_SLOT, 12 + 5);
    let own = track.vehicle(entity).status.position;
    let behind = own - Vec3::new(10.0, 0.0, 0.0);

    // beams on / off / on / off / on: three rising edges well inside 5 s.
    for i in 0..6 {
        track.send_player(0, player_status(behind, Vec3::ZERO, i % 2 == 0));
        track.tick(1);
        if track.vehicle(entity).lane_change.is_changing() {
            break;
        }
    }

    let vehicle = track.vehicle(entity);
    assert!(vehicle.lane_change.is_changing());
    assert!(vehicle.indicator == INDICATE_LEFT || vehicle.indicator == INDICATE_RIGHT);
    // The counter resets once the request fires.
    assert_eq!(vehicle.flash_trackers[&0].count, 0);
}

#[test]
fn test_flash_window_expires_between_flashes() {
    let mut track = TestTrack::with_config(
        RoadGraphBuilder::straight(3, 12, 5.0).build(),
        fixed_speed_config(0.0),
    );
    let entity = track.spawn_vehicle(AI_SLOT, 12 + 5);
    let own = track.vehicle(entity).status.position;
    let behind = own - Vec3::new(10.0, 0.0, 0.0);

    // Two flashes...
    for i in 0..4 {
        track.send_player(0, player_status(behind, Vec3::ZERO, i % 2 == 0));
        track.tick(1);
    }
    assert_eq!(track.vehicle(entity).flash_trackers[&0].count, 2);

    // ...then silence for longer than the window...
    track.send_player(0, player_status(behind, Vec3::ZERO, false));
    track.tick(170); // ~5.6 s

    // ...so the next flash starts a fresh count instead of firing.
    track.send_player(0, player_status(behind, Vec3::ZERO, true));
    track.tick(1);
    let vehicle = track.vehicle(entity);
    assert!(!vehicle.lane_change.is_changing());
    assert_eq!(vehicle.flash_trackers[&0].count, 1);
}

#[test]
fn test_flash_ignored_from_the_side() {
    let mut track = TestTrack::with_config(
        RoadGraphBuilder::straight(3, 12, 5.0).build(),
        fixed_speed_config(0.0),
    );
    let entity = track.spawn_vehicle(AI_SLOT, 12 + 5);
    let own = track.vehicle(entity).status.position;
    // 10 m to the side: inside the radius, far outside the rear cone.
    let beside = own + Vec3::new(0.0, 0.0, 10.0);

    for i in 0..8 {
        track.send_player(0, player_status(beside, Vec3::ZERO, i % 2 == 0));
        track.tick(1);
    }
    let vehicle = track.vehicle(entity);
    assert!(!vehicle.lane_change.is_changing());
    assert!(!vehicle.flash_trackers.contains_key(&0));
}

#[test]
fn test_scare_latches_fades_and_extinguishes() {
    let mut track = TestTrack::with_config(
        RoadGraphBuilder::straight(1, 30, 5.0).build(),
        fixed_speed_config(0.0),
    );
    let entity = track.spawn_vehicle(AI_SLOT, 5);
    let own = track.vehicle(entity).status.position;

    // A fast player brushing past within the scare radius.
    let beside = own + Vec3::new(0.0, 0.0, 1.5);
    track.send_player(0, player_status(beside, Vec3::new(50.0, 0.0, 0.0), false));

    // The latch is a 1-in-25 roll per tick; 500 ticks make it certain for
    // any seed in practice.
    track.tick(500);
    let vehicle = track.vehicle(entity);
    assert!(vehicle.scare.fade > 0.05, "scare must have latched and faded in");
    assert!(vehicle.scare.direction == 1.0 || vehicle.scare.direction == -1.0);

    // The lateral offset never exceeds the cap (the lane itself is at z=0).
    assert!(
        vehicle.status.position.z.abs()
            <= SCARE_MAX_OFFSET + vehicle.deviation.amplitude + 1e-3
    );

    // Player gone: the episode extinguishes and fades out.
    track.disconnect_player(0);
    track.tick(400);
    let vehicle = track.vehicle(entity);
    assert!(!vehicle.scare.active);
    assert!(vehicle.scare.fade < 0.01);
}

// ---------------------------------------------------------------------------
// Snapshot output
// ---------------------------------------------------------------------------

#[test]
fn test_status_snapshot_contents() {
    let mut track = TestTrack::with_config(
        RoadGraphBuilder::ring(1, 64, 200.0).build(),
        fixed_speed_config(22.0),
    );
    let entity = track.spawn_vehicle(AI_SLOT, 0);
    track.tick(5);

    let vehicle = track.vehicle(entity);
    let status = &vehicle.status;
    assert_eq!(status.timestamp, track.clock_ms());
    assert_eq!(status.gear, CRUISE_GEAR);
    assert_eq!(status.steer_angle, 127);
    assert!(status.flags.contains(LIGHTS_ON));
    assert!(status.flags.contains(HIGH_BEAMS_OFF));
    assert!((status.velocity.length() - vehicle.current_speed).abs() < 1e-3);
    assert!(status.engine_rpm >= 800 && status.engine_rpm <= 3000);
    assert!(status.tyre_angular_speed[0] > 100, "moving wheels encode above the zero offset");
    assert_eq!(status.tyre_angular_speed[0], status.tyre_angular_speed[3]);

    // Published to the board for other vehicles.
    let entry = track.board().get(AI_SLOT).unwrap();
    assert!(entry.active && !entry.player);
    assert_eq!(entry.current_speed, vehicle.current_speed);
}

#[test]
fn test_wipers_follow_rain() {
    let mut track = TestTrack::with_config(
        RoadGraphBuilder::ring(1, 64, 200.0).build(),
        fixed_speed_config(22.0),
    );
    let entity = track.spawn_vehicle(AI_SLOT, 0);

    track.set_rain(0.3);
    track.tick(1);
    assert!(track.vehicle(entity).status.flags.contains(WIPER_LEVEL_2));

    track.set_rain(0.0);
    track.tick(1);
    assert!(!track.vehicle(entity).status.flags.contains(WIPER_LEVEL_2));
}

// ---------------------------------------------------------------------------
// Geometry helpers
// ---------------------------------------------------------------------------

#[test]
fn test_relative_bearing_front_and_rear() {
    use super::obstacles::relative_bearing_deg;

    // Own vehicle at the origin heading +X.
    let mut own = CarStatus::default();
    own.rotation.x = -std::f32::consts::FRAC_PI_2;

    let mut behind = CarStatus::default();
    behind.position = Vec3::new(-5.0, 0.0, 0.0);
    let bearing = relative_bearing_deg(&own, &behind);
    assert!(bearing < 1.0 || bearing > 359.0, "behind should be ~0, got {bearing}");

    let mut ahead = CarStatus::default();
    ahead.position = Vec3::new(5.0, 0.0, 0.0);
    let bearing = relative_bearing_deg(&own, &ahead);
    assert!((bearing - 180.0).abs() < 1.0, "ahead should be ~180, got {bearing}");
}

#[test]
fn test_forward_footprint_test() {
    let mut vehicle = AiVehicle::new();
    vehicle.status.rotation.x = -std::f32::consts::FRAC_PI_2; // heading +X

    // Directly ahead inside the rectangle.
    let mut other = CarStatus::default();
    other.position = Vec3::new(5.0, 0.0, 0.0);
    assert!(vehicle.is_obstacle(&other));

    // Behind.
    other.position = Vec3::new(-5.0, 0.0, 0.0);
    assert!(!vehicle.is_obstacle(&other));

    // Ahead but a full lane and a half to the side.
    other.position = Vec3::new(5.0, 0.0, 6.0);
    assert!(!vehicle.is_obstacle(&other));

    // Beyond the rectangle's reach.
    other.position = Vec3::new(30.0, 0.0, 0.0);
    assert!(!vehicle.is_obstacle(&other));
}
