//! Scalar vehicle physics and spline interpolation helpers.
//!
//! Pure functions shared by the vehicle controller: braking/cornering
//! estimates used by the lookahead, and the cubic Hermite evaluation that
//! turns road-graph segments into smooth positions and tangents.

use bevy::math::Vec3;

/// Gravitational acceleration used for cornering-speed estimates, m/s².
const GRAVITY: f32 = 9.81;

/// Distance needed to brake from `speed` down to zero at a constant
/// `deceleration` (meters; inputs in m/s and m/s²).
pub fn braking_distance(speed: f32, deceleration: f32) -> f32 {
    if deceleration <= 0.0 {
        return f32::MAX;
    }
    (speed * speed) / (2.0 * deceleration)
}

/// Squared maximum speed a vehicle can hold through a corner of the given
/// curvature radius. `cornering_factor` scales the assumed lateral grip.
pub fn max_cornering_speed_squared(radius: f32, cornering_factor: f32) -> f32 {
    radius * GRAVITY * cornering_factor
}

/// Position and (normalized) tangent produced by one spline evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplineSample {
    pub position: Vec3,
    pub tangent: Vec3,
}

/// Cubic Hermite interpolation between `p0` and `p1` with tangents `t0`/`t1`
/// (the Catmull-Rom form when tangents are half point differences).
///
/// `t = 0` returns exactly `p0`; `t = 1` returns exactly `p1`.
pub fn catmull_rom(p0: Vec3, p1: Vec3, t0: Vec3, t1: Vec3, t: f32) -> SplineSample {
    let t2 = t * t;
    let t3 = t2 * t;

    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;

    let position = p0 * h00 + t0 * h10 + p1 * h01 + t1 * h11;

    // Basis derivatives give the curve tangent at t.
    let d00 = 6.0 * t2 - 6.0 * t;
    let d10 = 3.0 * t2 - 4.0 * t + 1.0;
    let d01 = -6.0 * t2 + 6.0 * t;
    let d11 = 3.0 * t2 - 2.0 * t;

    let tangent = (p0 * d00 + t0 * d10 + p1 * d01 + t1 * d11).normalize_or_zero();

    SplineSample { position, tangent }
}
