//! Squares Game Server
//!
//! Authoritative position-sync server binary. Clients connect over
//! WebSocket; the world ticks at a fixed rate and broadcasts every change.

use std::net::SocketAddr;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use squares::{GameServer, ServerConfig, DEFAULT_PORT, PLAYER_LIMIT, TICK_RATE, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let bind_addr: SocketAddr = std::env::var("SQUARES_BIND")
        .unwrap_or_else(|_| format!("0.0.0.0:{DEFAULT_PORT}"))
        .parse()
        .context("invalid SQUARES_BIND address")?;

    info!("Squares Server v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);
    info!("Player Limit: {}", PLAYER_LIMIT);

    let config = ServerConfig {
        bind_addr,
        ..Default::default()
    };
    let server = GameServer::bind(config)
        .await
        .context("failed to bind game channel")?;
    info!("Game channel: ws://{}", server.local_addr()?);

    server.run().await.context("server terminated")?;
    Ok(())
}
