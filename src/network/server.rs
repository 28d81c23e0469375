//! WebSocket Game Server
//!
//! Async WebSocket server: accepts connections, feeds their callbacks into
//! the world session and drives the fixed-rate tick scheduler. All session
//! access goes through one `Mutex`, which gives every callback and every
//! tick run-to-completion semantics.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::network::session::{PeerHandle, SessionConfig, WorldSession};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address for the game channel.
    pub bind_addr: SocketAddr,
    /// Maximum simultaneously connected players.
    pub max_players: usize,
    /// Tick rate for the simulation (Hz).
    pub tick_rate: u32,
    /// World dimensions and player footprint.
    pub bounds: crate::game::state::WorldBounds,
    /// Whether capacity refusals count into the rejection metric.
    pub count_rejected_connections: bool,
    /// How often the stats snapshot is pushed.
    pub stats_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], crate::DEFAULT_PORT)),
            max_players: crate::PLAYER_LIMIT,
            tick_rate: crate::TICK_RATE,
            bounds: crate::game::state::WorldBounds::default(),
            count_rejected_connections: true,
            stats_interval: Duration::from_secs(2),
        }
    }
}

impl ServerConfig {
    /// Target interval between tick starts.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate as u64)
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            bounds: self.bounds,
            max_players: self.max_players,
            count_rejected_connections: self.count_rejected_connections,
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// The game server.
pub struct GameServer {
    config: ServerConfig,
    session: Arc<Mutex<WorldSession>>,
    listener: TcpListener,
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Bind the game channel and prepare an empty world.
    pub async fn bind(config: ServerConfig) -> Result<Self, GameServerError> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        let (shutdown_tx, _) = broadcast::channel(1);
        let session = Arc::new(Mutex::new(WorldSession::new(config.session_config())));

        Ok(Self {
            config,
            session,
            listener,
            shutdown_tx,
        })
    }

    /// Address the server actually bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, GameServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the accept loop, the tick scheduler and the stats reporter until
    /// shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        info!("Game server listening on {}", self.local_addr()?);

        let tick_handle = tokio::spawn(run_tick_loop(
            self.session.clone(),
            self.config.tick_interval(),
            self.shutdown_tx.subscribe(),
        ));
        let stats_handle = tokio::spawn(run_stats_reporter(
            self.session.clone(),
            self.config.stats_interval,
            self.shutdown_tx.subscribe(),
        ));

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        tick_handle.abort();
        stats_handle.abort();

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let session = self.session.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<Message>();

            // Writer task: drains the fire-and-forget channel. Dropping the
            // sender side closes the socket.
            let writer = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    if ws_sender.send(msg).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
            });

            // Admission runs before any identity exists; at capacity the
            // handle is dropped, which tears the socket down with no state
            // created and no event emitted.
            let id = match session.lock().await.on_open(PeerHandle::new(msg_tx)) {
                Ok(id) => id,
                Err(reject) => {
                    debug!("Refused connection from {}: {}", addr, reject);
                    writer.await.ok();
                    return;
                }
            };

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                if let Err(reject) =
                                    session.lock().await.on_message(id, text.as_bytes())
                                {
                                    debug!("Terminating player {}: {}", id, reject);
                                    break;
                                }
                            }
                            Some(Ok(Message::Binary(data))) => {
                                if let Err(reject) =
                                    session.lock().await.on_message(id, &data)
                                {
                                    debug!("Terminating player {}: {}", id, reject);
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Player {} ({}) closed the connection", id, addr);
                                break;
                            }
                            Some(Err(e)) => {
                                debug!("WebSocket error for player {}: {}", id, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            // Teardown of any cause funnels through on_close exactly once.
            session.lock().await.on_close(id);
            writer.abort();
        });
    }

    /// Signal every task to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Current roster size.
    pub async fn player_count(&self) -> usize {
        self.session.lock().await.player_count()
    }

    /// Snapshot of the metrics sink.
    pub async fn stats_snapshot(&self) -> crate::metrics::StatsSnapshot {
        self.session.lock().await.stats_snapshot()
    }
}

/// Delay before the next tick: the target interval minus the time the tick
/// body took, floored at zero. An overrunning tick fires the next one
/// immediately; missed cadence is never compensated.
fn next_tick_delay(interval: Duration, processing: Duration) -> Duration {
    interval.saturating_sub(processing)
}

/// Self-correcting fixed-rate tick loop. The next tick is scheduled only
/// after the current one fully completes, so ticks never overlap.
async fn run_tick_loop(
    session: Arc<Mutex<WorldSession>>,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut delay = interval;
    let mut prev = Instant::now();

    loop {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_rx.recv() => break,
        }

        let now = Instant::now();
        let dt = now - prev;
        prev = now;

        let processing = session.lock().await.tick(dt);
        delay = next_tick_delay(interval, processing);
    }
}

/// Periodic snapshot push: serializes the stats sink onto a dedicated
/// tracing target for external collection.
async fn run_stats_reporter(
    session: Arc<Mutex<WorldSession>>,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown_rx.recv() => break,
        }

        let snapshot = session.lock().await.stats_snapshot();
        match serde_json::to_string(&snapshot) {
            Ok(json) => info!(target: "squares::stats", "{}", json),
            Err(e) => error!("Failed to serialize stats snapshot: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::protocol::ServerMessage;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    #[test]
    fn server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.tick_rate, crate::TICK_RATE);
        assert_eq!(config.max_players, crate::PLAYER_LIMIT);
        assert!(config.count_rejected_connections);
        assert_eq!(config.tick_interval(), Duration::from_micros(33_333));
    }

    #[test]
    fn tick_delay_is_interval_minus_processing_floored_at_zero() {
        let interval = Duration::from_millis(33);
        assert_eq!(
            next_tick_delay(interval, Duration::from_millis(3)),
            Duration::from_millis(30)
        );
        assert_eq!(next_tick_delay(interval, interval), Duration::ZERO);
        assert_eq!(
            next_tick_delay(interval, Duration::from_millis(100)),
            Duration::ZERO
        );
    }

    fn test_config() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn server_binds_and_shuts_down() {
        let server = GameServer::bind(test_config()).await.unwrap();
        assert_eq!(server.player_count().await, 0);
        server.shutdown();
    }

    async fn recv_message(ws: &mut WebSocketStream<MaybeTlsStream<TcpStream>>) -> ServerMessage {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
                .await
                .expect("timed out waiting for message")
                .expect("stream ended")
                .expect("websocket error");
            if let Message::Text(text) = msg {
                return ServerMessage::from_json(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn clients_are_greeted_and_announced() {
        let server = Arc::new(GameServer::bind(test_config()).await.unwrap());
        let addr = server.local_addr().unwrap();
        let runner = {
            let server = server.clone();
            tokio::spawn(async move { server.run().await })
        };

        let url = format!("ws://{addr}");
        let (mut first, _) = connect_async(&url).await.unwrap();
        let hello = recv_message(&mut first).await;
        let first_id = match hello {
            ServerMessage::Hello { id, .. } => id,
            other => panic!("expected Hello, got {other:?}"),
        };

        let (mut second, _) = connect_async(&url).await.unwrap();
        match recv_message(&mut second).await {
            ServerMessage::Hello { id, .. } => assert!(id > first_id),
            other => panic!("expected Hello, got {other:?}"),
        }
        // Newcomer replays the first player; incumbent hears the announcement.
        match recv_message(&mut second).await {
            ServerMessage::PlayerJoined { id, .. } => assert_eq!(id, first_id),
            other => panic!("expected PlayerJoined replay, got {other:?}"),
        }
        match recv_message(&mut first).await {
            ServerMessage::PlayerJoined { id, .. } => assert!(id > first_id),
            other => panic!("expected PlayerJoined announcement, got {other:?}"),
        }

        server.shutdown();
        let _ = runner.await;
    }

    #[tokio::test]
    async fn capacity_refusal_closes_without_identity() {
        let config = ServerConfig {
            max_players: 1,
            ..test_config()
        };
        let server = Arc::new(GameServer::bind(config).await.unwrap());
        let addr = server.local_addr().unwrap();
        let runner = {
            let server = server.clone();
            tokio::spawn(async move { server.run().await })
        };

        let url = format!("ws://{addr}");
        let (mut first, _) = connect_async(&url).await.unwrap();
        match recv_message(&mut first).await {
            ServerMessage::Hello { .. } => {}
            other => panic!("expected Hello, got {other:?}"),
        }

        let (mut refused, _) = connect_async(&url).await.unwrap();
        // The refused socket closes without ever receiving a Hello.
        let outcome = tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(msg) = refused.next().await {
                match msg {
                    Ok(Message::Text(_)) => panic!("refused connection received a message"),
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
        })
        .await;
        assert!(outcome.is_ok(), "refused connection was not closed");
        assert_eq!(server.player_count().await, 1);

        server.shutdown();
        let _ = runner.await;
    }
}
