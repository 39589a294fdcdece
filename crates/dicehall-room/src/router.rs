//! Room router: one actor per room name, respawned on demand.
//!
//! The router is the durable face of the room subsystem. It owns the
//! connection registry and a name-keyed handle table; actors behind the
//! handles come and go with traffic, and a command that finds a dead
//! handle triggers exactly one respawn-and-retry.

use std::collections::HashMap;

use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use dicehall_protocol::{ConnectionId, RoomName};

use crate::actor::spawn_room;
use crate::{ConnectionRegistry, RoomConfig, RoomError, RoomHandle, RoomLogic};

/// Routes connections and frames to per-room actors.
pub struct RoomRouter<L: RoomLogic> {
    config: RoomConfig,
    registry: ConnectionRegistry,
    rooms: Mutex<HashMap<RoomName, RoomHandle>>,
    make_logic: Box<dyn Fn(&RoomName) -> L + Send + Sync>,
}

impl<L: RoomLogic> RoomRouter<L> {
    /// Creates a router. `make_logic` builds the logic for each new actor
    /// instance (fresh spawn or respawn alike).
    pub fn new(
        config: RoomConfig,
        registry: ConnectionRegistry,
        make_logic: impl Fn(&RoomName) -> L + Send + Sync + 'static,
    ) -> Self {
        Self {
            config: config.validated(),
            registry,
            rooms: Mutex::new(HashMap::new()),
            make_logic: Box::new(make_logic),
        }
    }

    /// The shared connection registry.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Registers a connection and accepts it into its room. The catch-up
    /// payload is queued on `outbound` before this returns.
    pub async fn connect(
        &self,
        room: &RoomName,
        conn: ConnectionId,
        user_id: Uuid,
        username: &str,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Result<(), RoomError> {
        self.registry.insert(conn, room.clone(), outbound);

        let handle = self.handle_for(room, false).await;
        match handle.accept(conn, user_id, username).await {
            Err(RoomError::Unavailable(_)) => {
                let handle = self.handle_for(room, true).await;
                handle.accept(conn, user_id, username).await
            }
            other => other,
        }
    }

    /// Delivers one raw inbound frame from a connected client.
    pub async fn deliver(&self, conn: ConnectionId, raw: String) -> Result<(), RoomError> {
        let room = self
            .registry
            .room_of(conn)
            .ok_or_else(|| RoomError::Validation(format!("{conn} is not registered")))?;

        let handle = self.handle_for(&room, false).await;
        match handle.frame(conn, raw.clone()).await {
            Err(RoomError::Unavailable(_)) => {
                let handle = self.handle_for(&room, true).await;
                handle.frame(conn, raw).await
            }
            other => other,
        }
    }

    /// Tears down a connection on close or error. Idempotent; a dead actor
    /// has no session left to clean, so an unavailable handle is fine.
    pub async fn disconnect(&self, conn: ConnectionId) {
        let Some(room) = self.registry.room_of(conn) else {
            return;
        };
        let handle = self.handle_for(&room, false).await;
        let _ = handle.closed(conn).await;
        self.registry.remove(conn);
    }

    /// Returns the live handle for a room, spawning an actor if needed.
    /// `respawn` forces a fresh spawn after a handle turned out dead.
    async fn handle_for(&self, room: &RoomName, respawn: bool) -> RoomHandle {
        let mut rooms = self.rooms.lock().await;
        if respawn {
            rooms.remove(room);
            tracing::info!(%room, "respawning evicted room actor");
        }
        rooms
            .entry(room.clone())
            .or_insert_with(|| {
                spawn_room(
                    room.clone(),
                    self.config.clone(),
                    self.registry.clone(),
                    (self.make_logic)(room),
                )
            })
            .clone()
    }
}
