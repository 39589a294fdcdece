//! Durable storage seam for Dicehall.
//!
//! Rooms treat storage as an opaque get/put/query interface: the actor
//! awaits these calls inline, and the single-writer property guarantees no
//! two storage operations for the same room ever overlap. A real deployment
//! plugs a SQL- or KV-backed implementation in here; the crate ships
//! [`MemoryStore`] for tests and the demo server.
//!
//! Storage unavailability is the one hard failure in the write path: an
//! event whose append fails is never broadcast.

mod memory;

pub use memory::MemoryStore;

use std::future::Future;

use dicehall_protocol::{RoomEvent, RoomName};

/// Errors surfaced by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A stored record failed to decode.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Append-only event log, one log per room name.
///
/// Methods are declared in the desugared form with a `Send` bound so the
/// futures can run inside spawned room actors; implementations write plain
/// `async fn`.
pub trait EventStore: Clone + Send + Sync + 'static {
    /// Appends one event. Must return before the caller broadcasts it.
    fn append(
        &self,
        room: &RoomName,
        event: &RoomEvent,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Returns the newest `limit` events, ordered oldest-first — the exact
    /// shape of a catch-up payload.
    fn tail(
        &self,
        room: &RoomName,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<RoomEvent>, StoreError>> + Send;

    /// Deletes events with `created_time` at or before `cutoff_millis`.
    /// Returns how many were dropped.
    fn prune_older_than(
        &self,
        room: &RoomName,
        cutoff_millis: i64,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;
}

/// Single durable value per room, for the counter variant.
pub trait ValueStore: Clone + Send + Sync + 'static {
    /// Reads the current value; an unseen room reads as 0.
    fn get(&self, room: &RoomName) -> impl Future<Output = Result<i64, StoreError>> + Send;

    /// Writes the value. Read-modify-write is safe because the owning
    /// actor serializes all access to its room.
    fn put(
        &self,
        room: &RoomName,
        value: i64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
