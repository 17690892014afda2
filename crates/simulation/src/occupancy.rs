//! Shared per-point occupancy registry.
//!
//! Maps every road-graph point to at most one present vehicle slot. Vehicle
//! ticks run in parallel and re-register on every segment crossing, so each
//! point is a single atomic slot: `enter` is a plain store (last writer wins
//! on a spurious same-point collision, which correct topology never
//! produces), `leave` only clears the slot if the leaving vehicle still owns
//! it. All accesses are relaxed — the registry carries no ordering
//! obligations beyond its own cell values.

use std::sync::atomic::{AtomicU32, Ordering};

use bevy::prelude::*;

const EMPTY: u32 = u32::MAX;

#[derive(Resource, Debug, Default)]
pub struct Occupancy {
    points: Vec<AtomicU32>,
}

impl Occupancy {
    /// Reset the registry to `point_count` empty cells.
    pub fn resize_for(&mut self, point_count: usize) {
        self.points = (0..point_count).map(|_| AtomicU32::new(EMPTY)).collect();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Register `slot` as the occupant of `point`.
    pub fn enter(&self, point: u32, slot: u8) {
        if let Some(cell) = self.points.get(point as usize) {
            cell.store(slot as u32, Ordering::Relaxed);
        }
    }

    /// Unregister `slot` from `point`; a no-op if another vehicle has
    /// already claimed the point.
    pub fn leave(&self, point: u32, slot: u8) {
        if let Some(cell) = self.points.get(point as usize) {
            let _ = cell.compare_exchange(
                slot as u32,
                EMPTY,
                Ordering::Relaxed,
                Ordering::Relaxed,
            );
        }
    }

    pub fn occupant(&self, point: u32) -> Option<u8> {
        self.points
            .get(point as usize)
            .map(|cell| cell.load(Ordering::Relaxed))
            .filter(|&v| v != EMPTY)
            .map(|v| v as u8)
    }

    /// Number of currently occupied points.
    pub fn occupied_count(&self) -> usize {
        self.points
            .iter()
            .filter(|cell| cell.load(Ordering::Relaxed) != EMPTY)
            .count()
    }
}
