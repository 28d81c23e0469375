//! Game Logic Module
//!
//! Domain state and per-tick simulation, free of any networking.
//!
//! ## Module Structure
//!
//! - `state`: Players, movement directions, world bounds, spawning
//! - `events`: Per-tick event intake queue
//! - `physics`: Per-player position integration

pub mod events;
pub mod physics;
pub mod state;

// Re-export key types
pub use events::GameEvent;
pub use physics::advance;
pub use state::{Direction, Player, WorldBounds};
