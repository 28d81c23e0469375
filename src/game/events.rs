//! Game Events
//!
//! Lifecycle and movement events appended by connection callbacks and
//! drained once per tick. The queue is a plain ordered sequence: append-only
//! within a tick, no deduplication, bulk-cleared at tick end. Two `Moving`
//! events for the same player and direction in one tick are both kept and
//! both broadcast.

use crate::game::state::Direction;

/// An event recorded between two ticks. Immutable once created.
///
/// `Moving` carries the server-known position at the time the request was
/// accepted, never a client-supplied one.
#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    /// A player connected and was admitted.
    Joined {
        /// Assigned identifier.
        id: u32,
        /// Spawn position X.
        x: f32,
        /// Spawn position Y.
        y: f32,
        /// Assigned visual style.
        style: String,
    },

    /// A player's connection closed.
    Left {
        /// Identifier of the departed player.
        id: u32,
    },

    /// A player requested to start or stop moving in a direction.
    Moving {
        /// Identifier of the mover.
        id: u32,
        /// Server-known position X when the request arrived.
        x: f32,
        /// Server-known position Y when the request arrived.
        y: f32,
        /// True to start moving, false to stop.
        start: bool,
        /// Direction the flag applies to.
        direction: Direction,
    },
}
