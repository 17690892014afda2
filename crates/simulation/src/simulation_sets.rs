//! Deterministic simulation ordering via `SystemSet` phases.
//!
//! The sets establish a contract for system execution order within the
//! `FixedUpdate` schedule. Every simulation system belongs to one of them so
//! inter-system ordering is explicit rather than an implicit timing
//! assumption.
//!
//! ```text
//! PreSim  →  Simulation  →  PostSim
//! ```
//!
//! * **PreSim** – clock/tick bookkeeping and external input application:
//!   player status ingestion, spawn requests, collision signals. Everything
//!   the vehicle ticks read must be final before Simulation starts.
//! * **Simulation** – the vehicle ticks themselves: motion integration and
//!   then obstacle governance, both running over the vehicle query in
//!   parallel. Cross-vehicle reads go through the status board (published
//!   last tick) and the atomic occupancy registry only.
//! * **PostSim** – snapshot publication: every vehicle's freshly produced
//!   `CarStatus` is copied onto the status board for the broadcast layer and
//!   the next tick's reads.

use bevy::prelude::*;

/// Ordered phases for systems running in the `FixedUpdate` schedule.
///
/// Configured as a chain: `PreSim` → `Simulation` → `PostSim`. Plugins use
/// `.in_set(SimulationSet::X)` when registering systems, plus fine-grained
/// `.after()` constraints within a phase where needed.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimulationSet {
    /// Clock advance and external inputs (players, spawns, collisions).
    PreSim,
    /// Vehicle motion integration and obstacle/speed governance.
    Simulation,
    /// Status snapshot publication to the board.
    PostSim,
}
