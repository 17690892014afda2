//! Live player state ingestion.
//!
//! The network layer forwards every player position update as a
//! `PlayerStatusUpdate` event; the PreSim ingest system mirrors them onto the
//! status board. AI ticks only ever read those board rows — no controller
//! touches live connection state.

use bevy::prelude::*;

use crate::status::{CarStatus, StatusBoard};

/// Snapshot update for a player-driven slot.
#[derive(Event, Debug, Clone)]
pub struct PlayerStatusUpdate {
    pub slot: u8,
    pub status: CarStatus,
    pub length_pre: f32,
    pub length_post: f32,
    /// False when the player disconnected; frees the board row.
    pub connected: bool,
}

pub fn ingest_player_updates(
    mut events: EventReader<PlayerStatusUpdate>,
    mut board: ResMut<StatusBoard>,
) {
    for update in events.read() {
        if update.connected {
            board.publish_player(
                update.slot,
                update.status,
                update.length_pre,
                update.length_post,
            );
        } else {
            board.clear_slot(update.slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_publishes_and_clears() {
        let mut world = World::new();
        let mut board = StatusBoard::default();
        board.resize(4);
        world.insert_resource(board);
        world.init_resource::<Events<PlayerStatusUpdate>>();

        let mut status = CarStatus::default();
        status.position = Vec3::new(10.0, 0.0, 0.0);
        world.send_event(PlayerStatusUpdate {
            slot: 2,
            status,
            length_pre: 2.2,
            length_post: 1.8,
            connected: true,
        });
        let _ = world.run_system_cached(ingest_player_updates);

        {
            let board = world.resource::<StatusBoard>();
            let entry = board.get(2).unwrap();
            assert!(entry.active && entry.player);
            assert_eq!(entry.status.position.x, 10.0);
        }

        world.send_event(PlayerStatusUpdate {
            slot: 2,
            status: CarStatus::default(),
            length_pre: 0.0,
            length_post: 0.0,
            connected: false,
        });
        let _ = world.run_system_cached(ingest_player_updates);
        assert!(!world.resource::<StatusBoard>().get(2).unwrap().active);
    }
}
