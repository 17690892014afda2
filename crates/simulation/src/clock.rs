//! Monotonic server clock.
//!
//! All AI timers (spawn protection, collision stops, honk windows, flash
//! windows) are expressed in milliseconds of this clock, which advances once
//! per `FixedUpdate` in the PreSim phase.

use bevy::prelude::*;

/// Monotonic server time in milliseconds since startup.
#[derive(Resource, Debug, Default, Clone, Copy)]
pub struct SimClock {
    now_ms: i64,
}

impl SimClock {
    pub fn now_ms(&self) -> i64 {
        self.now_ms
    }

    pub fn advance(&mut self, delta_ms: i64) {
        self.now_ms += delta_ms.max(0);
    }

    /// Jump the clock to an absolute time. Test/replay hook.
    pub fn set(&mut self, now_ms: i64) {
        self.now_ms = now_ms;
    }
}

/// Advances the clock by the fixed timestep each tick.
pub fn advance_clock(time: Res<Time>, mut clock: ResMut<SimClock>) {
    clock.advance(time.delta().as_millis() as i64);
}
