//! # Dicehall
//!
//! Durable dice-roller chat rooms over WebSockets.
//!
//! Each room name maps to a single-writer actor that persists every event
//! before broadcasting it, replays a bounded history to new sessions, and
//! survives idle eviction by parking session identity on the connection
//! itself. The client side ships a reconnecting socket with exponential
//! backoff and keepalive.
//!
//! This meta-crate re-exports the sub-crates and provides the server
//! builder, the accept loop, and the per-connection handler.

mod error;
mod handler;
mod server;

pub use error::DicehallError;
pub use server::{DicehallServer, DicehallServerBuilder};

pub use dicehall_protocol as protocol;
pub use dicehall_render as render;
pub use dicehall_room as room;
pub use dicehall_store as store;
pub use dicehall_transport as transport;

/// One-stop imports for server and client code.
pub mod prelude {
    pub use crate::{DicehallError, DicehallServer, DicehallServerBuilder};

    pub use dicehall_protocol::{
        ClientMessage, ConnectionId, CounterClientMessage, CounterServerMessage, RoomEvent,
        RoomName, ServerMessage, SessionAttachment,
    };
    pub use dicehall_render::{render, render_event, RenderedRoll};
    pub use dicehall_room::{
        ChatLogic, ConnectionRegistry, CounterLogic, DiceEvaluator, RoomConfig, RoomLogic,
        RoomRouter, TableDice, HISTORY_LIMIT,
    };
    pub use dicehall_store::{EventStore, MemoryStore, ValueStore};
    pub use dicehall_transport::{ClientEvent, LinkState, ReconnectOptions, ReconnectingSocket};
}
