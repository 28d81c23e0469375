//! # Squares Position-Sync Server
//!
//! Authoritative multiplayer server: clients connect over WebSocket, request
//! movement, and the server broadcasts a consistent view of every connected
//! player at a fixed tick rate.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     SQUARES SERVER                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  game/           - Domain state and simulation               │
//! │  ├── state.rs    - Players, directions, world bounds         │
//! │  ├── events.rs   - Per-tick event intake queue               │
//! │  └── physics.rs  - Per-player position integration           │
//! │                                                              │
//! │  network/        - Networking                                │
//! │  ├── server.rs   - WebSocket accept loop + tick scheduler    │
//! │  ├── protocol.rs - Wire message types                        │
//! │  └── session.rs  - Roster, event intake, tick engine         │
//! │                                                              │
//! │  metrics.rs      - Counters and rolling-sample series        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//!
//! Single logical thread of game state: every connection callback
//! (open/message/close) and the whole tick body run under one session lock,
//! each to completion. Callbacks interleave freely *between* ticks but never
//! inside one. Outbound sends are fire-and-forget through per-connection
//! channels; a slow peer grows its buffer rather than stalling the tick.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod game;
pub mod metrics;
pub mod network;

// Re-export commonly used types
pub use game::events::GameEvent;
pub use game::state::{Direction, Player, WorldBounds};
pub use metrics::{ServerStats, StatsSnapshot};
pub use network::protocol::{MoveRequest, ServerMessage};
pub use network::server::{GameServer, ServerConfig};
pub use network::session::{Reject, WorldSession};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 30;

/// Maximum simultaneously connected players
pub const PLAYER_LIMIT: usize = 69;

/// World width in pixels
pub const WORLD_WIDTH: f32 = 800.0;

/// World height in pixels
pub const WORLD_HEIGHT: f32 = 600.0;

/// Player footprint (square side) in pixels
pub const PLAYER_SIZE: f32 = 30.0;

/// Player movement speed in pixels per second
pub const PLAYER_SPEED: f32 = 500.0;

/// Default game port
pub const DEFAULT_PORT: u16 = 6970;
