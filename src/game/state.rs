//! Game State Definitions
//!
//! Players, movement directions and world bounds. The roster itself lives in
//! the network session; this module only knows domain state.

use rand::Rng;
use serde::{Deserialize, Serialize};

// =============================================================================
// MOVEMENT DIRECTION
// =============================================================================

/// A movement direction a player can hold down.
///
/// The wire format uses lowercase names (`"left"`, `"right"`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Direction {
    /// Negative X
    Left = 0,
    /// Positive X
    Right = 1,
    /// Negative Y (screen coordinates)
    Up = 2,
    /// Positive Y
    Down = 3,
}

impl Direction {
    /// All directions, in flag-index order.
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Right,
        Direction::Up,
        Direction::Down,
    ];

    /// Index into a `moving` flag array.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Unit movement vector for this direction.
    #[inline]
    pub fn vector(self) -> (f32, f32) {
        match self {
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
            Direction::Up => (0.0, -1.0),
            Direction::Down => (0.0, 1.0),
        }
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// A connected player's authoritative state.
///
/// Positions are owned by the server; client-submitted coordinates are never
/// trusted for simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Process-scoped identifier, assigned at connection open.
    pub id: u32,
    /// Position X (top-left corner).
    pub x: f32,
    /// Position Y (top-left corner).
    pub y: f32,
    /// Visual tag, opaque to the server.
    pub style: String,
    /// Held-down movement flags, indexed by [`Direction::index`].
    pub moving: [bool; 4],
}

impl Player {
    /// Create a new stationary player.
    pub fn new(id: u32, x: f32, y: f32, style: String) -> Self {
        Self {
            id,
            x,
            y,
            style,
            moving: [false; 4],
        }
    }

    /// Whether the player currently holds the given direction.
    #[inline]
    pub fn is_moving(&self, direction: Direction) -> bool {
        self.moving[direction.index()]
    }
}

// =============================================================================
// WORLD BOUNDS
// =============================================================================

/// Fixed world dimensions and player footprint, used at spawn time and by
/// the physics integrator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldBounds {
    /// World width in pixels.
    pub width: f32,
    /// World height in pixels.
    pub height: f32,
    /// Player footprint (square side) in pixels.
    pub player_size: f32,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            width: crate::WORLD_WIDTH,
            height: crate::WORLD_HEIGHT,
            player_size: crate::PLAYER_SIZE,
        }
    }
}

impl WorldBounds {
    /// Uniformly random spawn position keeping the full footprint inside
    /// the world: `[0, width - size) x [0, height - size)`.
    pub fn random_spawn<R: Rng>(&self, rng: &mut R) -> (f32, f32) {
        let x = rng.gen::<f32>() * (self.width - self.player_size);
        let y = rng.gen::<f32>() * (self.height - self.player_size);
        (x, y)
    }
}

/// Random visual style: an HSL color with full saturation spread.
pub fn random_style<R: Rng>(rng: &mut R) -> String {
    let hue = rng.gen_range(0..360);
    format!("hsl({hue} 80% 50%)")
}
