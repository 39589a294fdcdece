//! Counter room logic.
//!
//! The smallest useful room: one durable integer per room name. Every
//! accepted mutation is written through the value store before the new
//! value is broadcast, over the same accept/session/broadcast shape as the
//! chat room.

use dicehall_protocol::{
    Codec, ConnectionId, CounterClientMessage, CounterServerMessage, JsonCodec,
};
use dicehall_store::ValueStore;

use crate::{RoomContext, RoomError, RoomLogic};

/// Room logic for a shared counter over a [`ValueStore`].
pub struct CounterLogic<S: ValueStore> {
    store: S,
    value: i64,
}

impl<S: ValueStore> CounterLogic<S> {
    pub fn new(store: S) -> Self {
        Self { store, value: 0 }
    }
}

impl<S: ValueStore> RoomLogic for CounterLogic<S> {
    async fn warm(&mut self, ctx: &RoomContext<'_>) -> Result<(), RoomError> {
        self.value = self.store.get(ctx.room).await?;
        Ok(())
    }

    async fn on_accept(
        &mut self,
        ctx: &RoomContext<'_>,
        conn: ConnectionId,
    ) -> Result<(), RoomError> {
        ctx.send_to(conn, &CounterServerMessage::Value(self.value))
    }

    async fn on_frame(
        &mut self,
        ctx: &RoomContext<'_>,
        _conn: ConnectionId,
        raw: &str,
    ) -> Result<(), RoomError> {
        let msg: CounterClientMessage = JsonCodec
            .decode(raw)
            .map_err(|e| RoomError::Validation(e.to_string()))?;
        let next = match msg {
            CounterClientMessage::Increment(n) => self.value.saturating_add(n),
            CounterClientMessage::Decrement(n) => self.value.saturating_sub(n),
        };

        // Write-through before anyone hears the new value. Safe without a
        // compare-and-swap: the owning actor serializes all room access.
        self.store.put(ctx.room, next).await?;
        self.value = next;

        ctx.broadcast(&CounterServerMessage::Value(self.value))
    }
}
