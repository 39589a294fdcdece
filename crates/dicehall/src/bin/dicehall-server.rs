//! Demo server: chat/roll rooms over the in-memory store.
//!
//! ```sh
//! DICEHALL_ADDR=127.0.0.1:8080 RUST_LOG=dicehall=debug dicehall-server
//! ```
//!
//! Connect with a WebSocket client at
//! `ws://127.0.0.1:8080/?roomName=<room>&userId=<uuid>&username=<name>`.

use dicehall::prelude::*;
use dicehall_protocol::RoomName;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), DicehallError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::var("DICEHALL_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    let store = MemoryStore::new();
    let config = RoomConfig::default();
    let history_limit = config.history_limit;
    let max_age = config.retention_max_age;

    let server = DicehallServerBuilder::new()
        .bind(&addr)
        .room_config(config)
        .build(move |_room: &RoomName| {
            ChatLogic::new(store.clone(), TableDice::new(), history_limit, max_age)
        })
        .await?;

    if let Ok(local) = server.local_addr() {
        tracing::info!(%local, "dicehall listening");
    }
    server.run().await
}
