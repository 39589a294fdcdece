//! Shared connection registry.
//!
//! One entry per live connection, owned by the router and shared with every
//! actor. Entries deliberately outlive actor instances: the serialized
//! identity attachment stored here is what a freshly warmed actor rebuilds
//! its session map from, so eviction never loses who is in the room.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use dicehall_protocol::{ConnectionId, RoomName};

struct ConnEntry {
    room: RoomName,
    outbound: mpsc::UnboundedSender<String>,
    attachment: Option<Vec<u8>>,
}

/// Process-wide connection table. Cheap to clone.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<HashMap<ConnectionId, ConnEntry>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, ConnEntry>> {
        // A poisoned lock only means a panicking task; the table is fine.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a connection before its room actor sees it.
    pub fn insert(
        &self,
        conn: ConnectionId,
        room: RoomName,
        outbound: mpsc::UnboundedSender<String>,
    ) {
        self.lock().insert(
            conn,
            ConnEntry {
                room,
                outbound,
                attachment: None,
            },
        );
    }

    /// Stores the serialized identity attachment on a connection.
    pub fn set_attachment(&self, conn: ConnectionId, bytes: Vec<u8>) {
        if let Some(entry) = self.lock().get_mut(&conn) {
            entry.attachment = Some(bytes);
        }
    }

    /// Reads back a connection's attachment, if any was stored.
    pub fn attachment(&self, conn: ConnectionId) -> Option<Vec<u8>> {
        self.lock().get(&conn).and_then(|e| e.attachment.clone())
    }

    /// The room a connection is registered to.
    pub fn room_of(&self, conn: ConnectionId) -> Option<RoomName> {
        self.lock().get(&conn).map(|e| e.room.clone())
    }

    /// Drops a connection's entry. Called on close or error.
    pub fn remove(&self, conn: ConnectionId) {
        self.lock().remove(&conn);
    }

    /// Every connection currently registered to `room`, with its
    /// attachment. This is the recovery enumeration.
    pub fn room_connections(&self, room: &RoomName) -> Vec<(ConnectionId, Option<Vec<u8>>)> {
        self.lock()
            .iter()
            .filter(|(_, entry)| &entry.room == room)
            .map(|(conn, entry)| (*conn, entry.attachment.clone()))
            .collect()
    }

    /// Queues one frame to a connection. Returns `false` if the connection
    /// is gone; callers tolerate that and move on.
    pub fn send_to(&self, conn: ConnectionId, frame: &str) -> bool {
        match self.lock().get(&conn) {
            Some(entry) => entry.outbound.send(frame.to_owned()).is_ok(),
            None => false,
        }
    }
}
