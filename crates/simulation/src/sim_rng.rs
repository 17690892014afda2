//! Deterministic simulation RNG.
//!
//! One run seed, one dedicated `ChaCha8Rng` stream per traffic slot. Vehicle
//! controllers own their stream as a component, so parallel ticking threads
//! never contend on a shared generator and a run replays bit-for-bit from the
//! configured seed.

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Seed used when the config does not provide one.
const DEFAULT_SEED: u64 = 42;

/// Run-wide RNG seed source.
#[derive(Resource, Debug, Clone, Copy)]
pub struct SimRng {
    seed: u64,
}

impl Default for SimRng {
    fn default() -> Self {
        Self { seed: DEFAULT_SEED }
    }
}

impl SimRng {
    pub fn from_seed_u64(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The dedicated random stream for one traffic slot. Streams share the
    /// run seed but never overlap.
    pub fn vehicle_stream(&self, slot: u8) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(slot as u64 + 1);
        rng
    }
}

/// Per-vehicle random stream, used for every stochastic decision the
/// controller makes (spawn parameters, junction choices, lane-change rolls,
/// scare latches).
#[derive(Component, Debug, Clone)]
pub struct VehicleRng(pub ChaCha8Rng);
