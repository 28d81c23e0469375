//! Network Layer
//!
//! WebSocket server, wire protocol and the per-world session that owns all
//! game state.

pub mod protocol;
pub mod server;
pub mod session;

pub use protocol::{MoveRequest, ServerMessage};
pub use server::{GameServer, GameServerError, ServerConfig};
pub use session::{PeerHandle, Reject, WorldSession};
