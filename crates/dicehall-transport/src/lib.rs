//! Transport layer for Dicehall.
//!
//! Server side: the [`Transport`] and [`Connection`] traits abstract the
//! listener and a single accepted connection; [`WebSocketTransport`] is the
//! shipped implementation. Identity rides on the upgrade request and is
//! handed to the caller as [`ConnectParams`].
//!
//! Client side: [`ReconnectingSocket`] re-dials on loss with exponential
//! backoff and optional keepalive.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod reconnect;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use reconnect::{backoff_delay, ClientEvent, LinkState, ReconnectOptions, ReconnectingSocket};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use dicehall_protocol::{ConnectionId, RoomName};
use uuid::Uuid;

/// Identity and routing parameters presented at connect time.
///
/// Validated during the upgrade handshake; a connection is never accepted
/// without a complete, well-formed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    /// Target room; routes to the room's single coordinator.
    pub room: RoomName,
    /// Client-generated, client-persisted user id.
    pub user_id: Uuid,
    /// Display name, 1-100 characters.
    pub username: String,
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection, together with
    /// the identity parameters it presented.
    async fn accept(&mut self) -> Result<(Self::Connection, ConnectParams), Self::Error>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A single connection that exchanges text frames.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one text frame to the remote peer.
    async fn send(&self, text: &str) -> Result<(), Self::Error>;

    /// Receives the next text frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<String>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
