//! In-memory storage backend for tests and the demo server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use dicehall_protocol::{RoomEvent, RoomName};

use crate::{EventStore, StoreError, ValueStore};

#[derive(Default)]
struct Inner {
    events: HashMap<String, Vec<RoomEvent>>,
    values: HashMap<String, i64>,
}

/// A process-local [`EventStore`] + [`ValueStore`].
///
/// Clones share the same underlying maps, so an actor that is evicted and
/// respawned sees the same history — which is exactly the durability
/// contract the room layer relies on.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a panicking test; the data is fine.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of stored events for a room. Test helper.
    pub fn event_count(&self, room: &RoomName) -> usize {
        self.lock().events.get(room.as_str()).map_or(0, Vec::len)
    }
}

impl EventStore for MemoryStore {
    async fn append(&self, room: &RoomName, event: &RoomEvent) -> Result<(), StoreError> {
        self.lock()
            .events
            .entry(room.as_str().to_owned())
            .or_default()
            .push(event.clone());
        Ok(())
    }

    async fn tail(&self, room: &RoomName, limit: usize) -> Result<Vec<RoomEvent>, StoreError> {
        let inner = self.lock();
        let Some(log) = inner.events.get(room.as_str()) else {
            return Ok(Vec::new());
        };
        let skip = log.len().saturating_sub(limit);
        Ok(log[skip..].to_vec())
    }

    async fn prune_older_than(
        &self,
        room: &RoomName,
        cutoff_millis: i64,
    ) -> Result<usize, StoreError> {
        let mut inner = self.lock();
        let Some(log) = inner.events.get_mut(room.as_str()) else {
            return Ok(0);
        };
        let before = log.len();
        log.retain(|event| event.created_time > cutoff_millis);
        Ok(before - log.len())
    }
}

impl ValueStore for MemoryStore {
    async fn get(&self, room: &RoomName) -> Result<i64, StoreError> {
        Ok(self.lock().values.get(room.as_str()).copied().unwrap_or(0))
    }

    async fn put(&self, room: &RoomName, value: i64) -> Result<(), StoreError> {
        self.lock().values.insert(room.as_str().to_owned(), value);
        Ok(())
    }
}
