//! Tuning constants for the vehicle controller.

/// Pedestrian-pace floor applied when matching a slow obstacle, m/s.
pub const WALKING_SPEED: f32 = 10.0 / 3.6;

/// Extra lookahead walked beyond twice the braking distance, meters.
pub const LOOKAHEAD_MARGIN: f32 = 20.0;

/// Below this speed hazard lights turn on, m/s.
pub const HAZARDS_SPEED_THRESHOLD: f32 = 20.0 / 3.6;

/// Fixed gear broadcast for cruising traffic.
pub const CRUISE_GEAR: u8 = 2;

// --- headlight flash detection -------------------------------------------

/// Rolling window in which flashes are counted, milliseconds.
pub const FLASH_WINDOW_MS: i64 = 5000;
/// Flashes within the window that trigger a lane-change request.
pub const REQUIRED_FLASHES: u32 = 3;
/// Players farther away than this are not tracked, meters.
pub const FLASH_DETECT_RADIUS: f32 = 18.0;
/// Rear bearing half-window for flash detection, degrees.
pub const FLASH_CONE_HALF_DEG: f32 = 10.0;

// --- lane changes ---------------------------------------------------------

pub const MIN_LANE_CHANGE_COOLDOWN_MS: i64 = 30_000;
pub const MAX_LANE_CHANGE_COOLDOWN_MS: i64 = 120_000;
pub const MIN_LANE_CHANGE_DURATION_S: f32 = 2.0;
pub const MAX_LANE_CHANGE_DURATION_S: f32 = 7.0;
/// Per-tick probability of considering a spontaneous lane change once the
/// cooldown has elapsed.
pub const LANE_CHANGE_CHANCE: f64 = 0.01;

// --- scare nudge ----------------------------------------------------------

/// A player inside this radius can start a scare episode, meters.
pub const SCARE_RADIUS: f32 = 3.0;
/// Proximity ramp length for the scare factor, meters.
pub const SCARE_DISTANCE_RAMP: f32 = 8.0;
/// Player speed where the scare factor starts ramping, m/s.
pub const SCARE_SPEED_THRESHOLD: f32 = 40.0;
/// Speed ramp length above the threshold, m/s.
pub const SCARE_SPEED_RAMP: f32 = 30.0;
/// Seconds to reach full fade when scared.
pub const SCARE_FADE_IN_SECONDS: f32 = 5.0;
/// Seconds to fade back out once the player is gone.
pub const SCARE_FADE_OUT_SECONDS: f32 = 10.0;
/// Lateral scare offset cap, meters.
pub const SCARE_MAX_OFFSET: f32 = 2.0;
/// Fade level to offset gain.
pub const SCARE_OFFSET_GAIN: f32 = 6.0;
/// One-in-N per-tick chance to latch a new scare episode.
pub const SCARE_LATCH_ODDS: u32 = 25;
/// Minimum factor considered a scare at all.
pub const SCARE_FACTOR_EPSILON: f32 = 0.01;

// --- obstacle governance --------------------------------------------------

/// Randomized hard-stop distance bounds, meters.
pub const MIN_OBSTACLE_DISTANCE_LOW: f32 = 8.0;
pub const MIN_OBSTACLE_DISTANCE_HIGH: f32 = 13.0;
/// Gridlock override: how long obstacles are ignored once granted, ms.
pub const GRIDLOCK_IGNORE_MS: i64 = 10_000;
/// Honk window bounds after stalling behind an obstacle, ms.
pub const MIN_HONK_DELAY_MS: i64 = 3_000;
pub const MAX_HONK_DELAY_MS: i64 = 7_000;
pub const MIN_HONK_DURATION_MS: i64 = 500;
pub const MAX_HONK_DURATION_MS: i64 = 1_500;
/// Forward bearing window in which a player counts as an obstacle, degrees.
pub const OBSTACLE_CONE_MIN_DEG: f32 = 166.0;
pub const OBSTACLE_CONE_MAX_DEG: f32 = 194.0;
/// Player speeds below this read as stationary, m/s.
pub const STATIONARY_EPSILON: f32 = 0.1;

// --- forward footprint test ----------------------------------------------

/// Half-width of the obstruction rectangle ahead of the vehicle, meters.
pub const FORWARD_RECT_HALF_WIDTH: f32 = 2.0;
/// Length of the obstruction rectangle, meters.
pub const FORWARD_RECT_LENGTH: f32 = 10.0;
/// Gap between the vehicle reference point and the rectangle, meters.
pub const FORWARD_RECT_OFFSET: f32 = 1.0;
/// Half extents of the obstacle footprint projected into it, meters.
pub const OBSTACLE_HALF_WIDTH: f32 = 0.5;
pub const OBSTACLE_HALF_LENGTH: f32 = 0.5;

// --- lane deviation -------------------------------------------------------

pub const DEVIATION_SPEED_BASE: f32 = 0.2;
pub const DEVIATION_SPEED_SPREAD: f32 = 0.3;
pub const DEVIATION_SPEED_SCALE: f32 = 0.15;
pub const DEVIATION_AMPLITUDE_BASE: f32 = 0.15;
pub const DEVIATION_AMPLITUDE_SPREAD: f32 = 0.15;

/// Body colors assigned per spawn, RGB.
pub const CAR_COLORS: [[u8; 3]; 18] = [
    [13, 17, 22],
    [19, 24, 31],
    [28, 29, 33],
    [12, 13, 24],
    [11, 20, 33],
    [151, 154, 151],
    [153, 157, 160],
    [194, 196, 198],
    [234, 234, 234],
    [255, 255, 255],
    [182, 17, 27],
    [218, 25, 24],
    [73, 17, 29],
    [35, 49, 85],
    [28, 53, 81],
    [37, 58, 167],
    [21, 92, 45],
    [18, 46, 43],
];
