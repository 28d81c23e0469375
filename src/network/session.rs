//! World Session Management
//!
//! The session owns every piece of game state: the player roster, the
//! per-tick event queue, the id counter and the stats sink. Connection
//! callbacks (`on_open`/`on_message`/`on_close`) and the tick body all run
//! under one lock held by the server, each to completion, so no further
//! synchronization exists in here.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error};

use crate::game::events::GameEvent;
use crate::game::physics::advance;
use crate::game::state::{random_style, Direction, Player, WorldBounds};
use crate::metrics::{ServerStats, StatsSnapshot};
use crate::network::protocol::{MoveRequest, ServerMessage};

/// Why a connection was refused or terminated.
///
/// None of these crash the process or the tick loop; closing the offending
/// connection is the only recovery. A client that reconnects gets a brand
/// new identity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Reject {
    /// The roster is at capacity; refused before identity assignment.
    #[error("player limit reached")]
    CapacityExceeded,

    /// Payload was not valid UTF-8 JSON.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Message from a connection whose player was already removed.
    #[error("no player for connection {0}")]
    UnknownEntity(u32),

    /// Well-formed JSON that is not a move request.
    #[error("unexpected message shape")]
    SchemaMismatch,
}

/// Send capability for one connection.
///
/// Wraps the channel to the socket writer task. Sends are fire-and-forget:
/// there is no backpressure, a slow peer grows its buffer instead of
/// stalling the tick.
#[derive(Clone, Debug)]
pub struct PeerHandle {
    tx: mpsc::UnboundedSender<Message>,
}

impl PeerHandle {
    /// Wrap a writer-task channel.
    pub fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self { tx }
    }

    /// Queue a text frame for this peer and return its payload byte count.
    pub fn send_text(&self, text: &str) -> usize {
        let _ = self.tx.send(Message::Text(text.to_owned()));
        text.len()
    }
}

/// A player plus the transport handle attached for the connection's
/// lifetime (1:1 with the entity).
#[derive(Debug)]
pub struct SessionPlayer {
    /// Authoritative domain state.
    pub player: Player,
    /// Send capability for this player's connection.
    pub peer: PeerHandle,
}

/// Configuration for a world session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// World dimensions and player footprint.
    pub bounds: WorldBounds,
    /// Maximum simultaneously connected players.
    pub max_players: usize,
    /// Whether capacity refusals count into the rejection metric.
    pub count_rejected_connections: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bounds: WorldBounds::default(),
            max_players: crate::PLAYER_LIMIT,
            count_rejected_connections: true,
        }
    }
}

/// The authoritative world: roster, event intake and tick engine.
pub struct WorldSession {
    config: SessionConfig,
    /// Roster keyed by player id. BTreeMap keeps broadcast order stable.
    players: BTreeMap<u32, SessionPlayer>,
    /// Event intake queue: insertion-ordered, bulk-cleared at tick end.
    queue: Vec<GameEvent>,
    /// Next identity; strictly increasing, never reused, untouched by
    /// refused connections.
    next_id: u32,
    /// Bytes received since the previous tick boundary.
    bytes_received_within_tick: u64,
    rng: StdRng,
    stats: ServerStats,
}

impl WorldSession {
    /// Create an empty session.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            players: BTreeMap::new(),
            queue: Vec::new(),
            next_id: 0,
            bytes_received_within_tick: 0,
            rng: StdRng::from_entropy(),
            stats: ServerStats::new(),
        }
    }

    /// Admit a new connection.
    ///
    /// At capacity the connection is refused before any identity is
    /// assigned: no state is created and no event is emitted. Otherwise the
    /// player spawns at a random in-bounds position with a random style and
    /// a `Joined` event is queued; the broadcast itself is deferred to the
    /// next tick.
    pub fn on_open(&mut self, peer: PeerHandle) -> Result<u32, Reject> {
        if self.players.len() >= self.config.max_players {
            if self.config.count_rejected_connections {
                self.stats.players_rejected += 1;
            }
            return Err(Reject::CapacityExceeded);
        }

        let id = self.next_id;
        self.next_id += 1;

        let (x, y) = self.config.bounds.random_spawn(&mut self.rng);
        let style = random_style(&mut self.rng);
        debug!("Player {} connected at ({:.1}, {:.1})", id, x, y);

        self.players.insert(
            id,
            SessionPlayer {
                player: Player::new(id, x, y, style.clone()),
                peer,
            },
        );
        self.queue.push(GameEvent::Joined { id, x, y, style });

        self.stats.players_joined += 1;
        self.stats.players_currently = self.players.len() as u64;
        Ok(id)
    }

    /// Handle an inbound frame from an identified connection.
    ///
    /// Message and byte counters are recorded unconditionally, even for
    /// garbage. On any `Err` the caller terminates the connection.
    pub fn on_message(&mut self, id: u32, raw: &[u8]) -> Result<(), Reject> {
        self.stats.messages_received += 1;
        self.stats.bytes_received += raw.len() as u64;
        self.bytes_received_within_tick += raw.len() as u64;

        let text = match std::str::from_utf8(raw) {
            Ok(text) => text,
            Err(e) => return Err(self.invalid(Reject::MalformedPayload(e.to_string()))),
        };
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => return Err(self.invalid(Reject::MalformedPayload(e.to_string()))),
        };

        // Position is read from the store, never from the client.
        let (x, y) = match self.players.get(&id) {
            Some(entry) => (entry.player.x, entry.player.y),
            None => return Err(self.invalid(Reject::UnknownEntity(id))),
        };

        let request: MoveRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(_) => return Err(self.invalid(Reject::SchemaMismatch)),
        };

        debug!(
            "Player {} move request: start={} direction={:?}",
            id, request.start, request.direction
        );
        self.queue.push(GameEvent::Moving {
            id,
            x,
            y,
            start: request.start,
            direction: request.direction,
        });
        Ok(())
    }

    /// Tear down an identified connection, whatever the cause.
    ///
    /// The player leaves the store immediately; peers learn about it at the
    /// next tick boundary.
    pub fn on_close(&mut self, id: u32) {
        self.stats.players_left += 1;
        debug!("Player {} disconnected", id);
        self.players.remove(&id);
        self.stats.players_currently = self.players.len() as u64;
        self.queue.push(GameEvent::Left { id });
    }

    fn invalid(&mut self, reject: Reject) -> Reject {
        self.stats.invalid_messages += 1;
        debug!("Rejecting connection: {}", reject);
        reject
    }

    /// Run one simulation tick and return the measured processing time.
    ///
    /// Phases run strictly in order: classify, welcome, announce, depart,
    /// move, simulate, record. The queue is drained as an atomic snapshot of
    /// everything since the previous tick.
    pub fn tick(&mut self, dt: Duration) -> Duration {
        let started = Instant::now();
        let dt_secs = dt.as_secs_f32();
        let mut messages_sent: u64 = 0;
        let mut bytes_sent: u64 = 0;

        // Classify: a join and a leave within the same tick cancel out, so
        // that player is invisible to every peer.
        let mut joined: BTreeSet<u32> = BTreeSet::new();
        let mut left: BTreeSet<u32> = BTreeSet::new();
        for event in &self.queue {
            match event {
                GameEvent::Joined { id, .. } => {
                    joined.insert(*id);
                }
                GameEvent::Left { id } => {
                    if !joined.remove(id) {
                        left.insert(*id);
                    }
                }
                GameEvent::Moving { .. } => {}
            }
        }

        // Welcome: greet each newcomer, then replay the rest of the world
        // to it, including held movement so motion resumes visually.
        for id in &joined {
            let Some(newcomer) = self.players.get(id) else {
                continue;
            };
            bytes_sent += send_message(
                &newcomer.peer,
                &ServerMessage::Hello {
                    id: newcomer.player.id,
                    x: newcomer.player.x,
                    y: newcomer.player.y,
                    style: newcomer.player.style.clone(),
                },
            ) as u64;
            messages_sent += 1;

            for other in self.players.values() {
                if other.player.id == *id {
                    continue;
                }
                bytes_sent += send_message(
                    &newcomer.peer,
                    &ServerMessage::PlayerJoined {
                        id: other.player.id,
                        x: other.player.x,
                        y: other.player.y,
                        style: other.player.style.clone(),
                    },
                ) as u64;
                messages_sent += 1;

                for direction in Direction::ALL {
                    if other.player.moving[direction.index()] {
                        bytes_sent += send_message(
                            &newcomer.peer,
                            &ServerMessage::PlayerMoving {
                                id: other.player.id,
                                x: other.player.x,
                                y: other.player.y,
                                start: true,
                                direction,
                            },
                        ) as u64;
                        messages_sent += 1;
                    }
                }
            }
        }

        // Announce: the newcomer learns about the world before the world
        // learns about the newcomer.
        for id in &joined {
            let Some(newcomer) = self.players.get(id) else {
                continue;
            };
            let announcement = ServerMessage::PlayerJoined {
                id: newcomer.player.id,
                x: newcomer.player.x,
                y: newcomer.player.y,
                style: newcomer.player.style.clone(),
            };
            for other in self.players.values() {
                if other.player.id == *id {
                    continue;
                }
                bytes_sent += send_message(&other.peer, &announcement) as u64;
                messages_sent += 1;
            }
        }

        // Depart: one broadcast round to the full current roster per leaver.
        for id in &left {
            let farewell = ServerMessage::PlayerLeft { id: *id };
            for other in self.players.values() {
                bytes_sent += send_message(&other.peer, &farewell) as u64;
                messages_sent += 1;
            }
        }

        // Move: apply each flag change in insertion order and fan the event
        // out verbatim to everyone, the mover included. Serialized once per
        // event, identical bytes to all recipients, no coalescing.
        let queue = std::mem::take(&mut self.queue);
        for event in &queue {
            let GameEvent::Moving {
                id,
                x,
                y,
                start,
                direction,
            } = event
            else {
                continue;
            };
            let Some(mover) = self.players.get_mut(id) else {
                // Joined, moved and left within a single tick.
                continue;
            };
            mover.player.moving[direction.index()] = *start;

            let relay = ServerMessage::PlayerMoving {
                id: *id,
                x: *x,
                y: *y,
                start: *start,
                direction: *direction,
            };
            let text = match relay.to_json() {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize movement event: {}", e);
                    continue;
                }
            };
            for other in self.players.values() {
                bytes_sent += other.peer.send_text(&text) as u64;
                messages_sent += 1;
            }
        }

        // Simulate: every stored player advances exactly once.
        for entry in self.players.values_mut() {
            advance(&mut entry.player, &self.config.bounds, dt_secs);
        }

        // Record.
        let processing = started.elapsed();
        self.stats.ticks += 1;
        self.stats.messages_sent += messages_sent;
        self.stats.bytes_sent += bytes_sent;
        self.stats.tick_times.push(processing.as_secs_f64());
        self.stats.tick_messages_sent.push(messages_sent as f64);
        self.stats.tick_events_received.push(queue.len() as f64);
        self.stats.tick_bytes_sent.push(bytes_sent as f64);
        self.stats
            .tick_bytes_received
            .push(self.bytes_received_within_tick as f64);
        self.bytes_received_within_tick = 0;

        processing
    }

    /// Current roster size.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Look up a stored player by id.
    pub fn player(&self, id: u32) -> Option<&Player> {
        self.players.get(&id).map(|entry| &entry.player)
    }

    /// Events accumulated since the last tick boundary.
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Read access to the stats sink.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// Snapshot the stats sink for external consumption.
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

/// Serialize and send one message, returning the byte count.
fn send_message(peer: &PeerHandle, msg: &ServerMessage) -> usize {
    match msg.to_json() {
        Ok(text) => peer.send_text(&text),
        Err(e) => {
            error!("Failed to serialize message: {}", e);
            0
        }
    }
}
