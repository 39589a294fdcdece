//! The `RoomLogic` trait — payload semantics behind the generic actor.
//!
//! The actor owns everything rooms have in common: the session map, warm-up
//! recovery, idle eviction, and the retention timer. A `RoomLogic`
//! implementation owns what differs per room kind: what to replay on
//! accept, how to react to an inbound frame, and what retention means.

use std::collections::HashMap;
use std::future::Future;

use serde::Serialize;

use dicehall_protocol::{Codec, ConnectionId, JsonCodec, RoomName, SessionAttachment};

use crate::{ConnectionRegistry, RoomError};

/// Borrowed view of the actor's state, handed to logic callbacks.
pub struct RoomContext<'a> {
    /// The room this actor owns.
    pub room: &'a RoomName,
    /// The shared connection registry.
    pub registry: &'a ConnectionRegistry,
    /// Sessions currently registered with this actor instance.
    pub sessions: &'a HashMap<ConnectionId, SessionAttachment>,
}

impl RoomContext<'_> {
    /// Sends one encoded message to a single session.
    pub fn send_to<T: Serialize>(&self, conn: ConnectionId, msg: &T) -> Result<(), RoomError> {
        let frame = JsonCodec.encode(msg)?;
        if !self.registry.send_to(conn, &frame) {
            tracing::debug!(room = %self.room, %conn, "dropping frame to dead connection");
        }
        Ok(())
    }

    /// Fans one encoded message out to every session, the sender included.
    /// Individual send failures are tolerated; the frame is encoded once.
    pub fn broadcast<T: Serialize>(&self, msg: &T) -> Result<(), RoomError> {
        let frame = JsonCodec.encode(msg)?;
        for conn in self.sessions.keys() {
            if !self.registry.send_to(*conn, &frame) {
                tracing::debug!(room = %self.room, %conn, "dropping frame to dead connection");
            }
        }
        Ok(())
    }
}

/// Per-room-kind behavior plugged into the generic actor.
///
/// Methods are declared in the desugared form with a `Send` bound because
/// the actor runs inside `tokio::spawn`; implementations write plain
/// `async fn`.
pub trait RoomLogic: Send + 'static {
    /// Called once per warm-up, after session recovery and before any
    /// command is served. Loads whatever the logic caches.
    fn warm(
        &mut self,
        ctx: &RoomContext<'_>,
    ) -> impl Future<Output = Result<(), RoomError>> + Send;

    /// A brand-new session was accepted. Sends the initial payload
    /// (catch-up, current value). Not called for recovered sessions.
    fn on_accept(
        &mut self,
        ctx: &RoomContext<'_>,
        conn: ConnectionId,
    ) -> impl Future<Output = Result<(), RoomError>> + Send;

    /// One raw inbound frame from a registered session. Errors are logged
    /// by the actor; neither the actor nor the connection goes down.
    fn on_frame(
        &mut self,
        ctx: &RoomContext<'_>,
        conn: ConnectionId,
        raw: &str,
    ) -> impl Future<Output = Result<(), RoomError>> + Send;

    /// Periodic retention pass. Default: nothing to retain.
    fn on_retention(
        &mut self,
        _ctx: &RoomContext<'_>,
    ) -> impl Future<Output = Result<(), RoomError>> + Send {
        async { Ok(()) }
    }
}
