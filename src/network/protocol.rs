//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages are JSON; server-to-client messages carry a `kind`
//! discriminator.

use serde::{Deserialize, Serialize};

use crate::game::state::Direction;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// The only message clients may send: start or stop moving in a direction.
///
/// Any other shape is rejected and the connection terminated. Coordinates
/// are deliberately absent; the server's position is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoveRequest {
    /// True to press the direction, false to release it.
    pub start: bool,
    /// Direction the request applies to.
    pub direction: Direction,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ServerMessage {
    /// Greets a newly admitted player with its own assigned state.
    Hello {
        /// Assigned identifier.
        id: u32,
        /// Spawn position X.
        x: f32,
        /// Spawn position Y.
        y: f32,
        /// Assigned visual style.
        style: String,
    },

    /// Announces a player to a peer (fresh join or world replay).
    PlayerJoined {
        /// Identifier of the joined player.
        id: u32,
        /// Current position X.
        x: f32,
        /// Current position Y.
        y: f32,
        /// Visual style of the joined player.
        style: String,
    },

    /// Announces a departure.
    PlayerLeft {
        /// Identifier of the departed player.
        id: u32,
    },

    /// Relays a movement flag change, stamped with the server-known position
    /// at the time the request was accepted.
    PlayerMoving {
        /// Identifier of the mover.
        id: u32,
        /// Server-known position X.
        x: f32,
        /// Server-known position Y.
        y: f32,
        /// True for press, false for release.
        start: bool,
        /// Direction the flag applies to.
        direction: Direction,
    },
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_messages_carry_kind_discriminator() {
        let hello = ServerMessage::Hello {
            id: 3,
            x: 1.0,
            y: 2.0,
            style: "hsl(10 80% 50%)".to_string(),
        };
        let json = hello.to_json().unwrap();
        assert!(json.contains("\"kind\":\"Hello\""));

        let left = ServerMessage::PlayerLeft { id: 3 };
        assert!(left.to_json().unwrap().contains("\"kind\":\"PlayerLeft\""));

        let moving = ServerMessage::PlayerMoving {
            id: 3,
            x: 1.0,
            y: 2.0,
            start: true,
            direction: Direction::Up,
        };
        let json = moving.to_json().unwrap();
        assert!(json.contains("\"kind\":\"PlayerMoving\""));
        assert!(json.contains("\"direction\":\"up\""));
    }

    #[test]
    fn server_message_json_roundtrip() {
        let msg = ServerMessage::PlayerJoined {
            id: 7,
            x: 12.5,
            y: 99.0,
            style: "hsl(200 80% 50%)".to_string(),
        };
        let parsed = ServerMessage::from_json(&msg.to_json().unwrap()).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn move_request_accepts_exact_shape() {
        let req: MoveRequest =
            serde_json::from_str(r#"{"start":true,"direction":"left"}"#).unwrap();
        assert!(req.start);
        assert_eq!(req.direction, Direction::Left);
    }

    #[test]
    fn move_request_rejects_extra_fields() {
        let result: Result<MoveRequest, _> =
            serde_json::from_str(r#"{"start":true,"direction":"left","x":5}"#);
        assert!(result.is_err());
    }

    #[test]
    fn move_request_rejects_wrong_shape() {
        for raw in [
            r#"{"start":true}"#,
            r#"{"direction":"left"}"#,
            r#"{"start":"yes","direction":"left"}"#,
            r#"{"start":true,"direction":"northwest"}"#,
            r#"[1,2,3]"#,
        ] {
            assert!(serde_json::from_str::<MoveRequest>(raw).is_err(), "{raw}");
        }
    }
}
