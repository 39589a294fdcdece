//! Core protocol types for Dicehall's wire format.
//!
//! The JSON shapes here are a compatibility contract with the browser
//! client: field spellings are exactly what goes on the wire, including the
//! mixed `created_time` / `userId` convention inherited from the persisted
//! message schema. The tests at the bottom pin those spellings down.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::ProtocolError;

/// Keepalive request token, exchanged as a raw text frame (not JSON).
pub const KEEPALIVE_REQUEST: &str = "ping";
/// Keepalive response token; swallowed by the client transport.
pub const KEEPALIVE_RESPONSE: &str = "pong";

/// Milliseconds since the Unix epoch. Event timestamps use this.
pub fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The name of a room: an opaque, non-empty string chosen by clients.
///
/// A room comes into existence the first time anyone connects to its name;
/// the same name always routes to the same single coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomName(String);

impl RoomName {
    /// Creates a room name, rejecting the empty string.
    pub fn new(name: impl Into<String>) -> Result<Self, ProtocolError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "room name must not be empty".into(),
            ));
        }
        Ok(Self(name))
    }

    /// The raw name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room/{}", self.0)
    }
}

/// Opaque identifier for one underlying connection.
///
/// Connection ids are process-local and never travel on the wire; they key
/// the registry entry that carries a connection's identity attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Session attachment
// ---------------------------------------------------------------------------

/// The identity tuple serialized onto a connection.
///
/// This is the piece that makes actor eviction survivable: the attachment
/// lives on the connection's registry entry, not in actor memory, so a
/// freshly warmed actor can rebuild its session map from attachments alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAttachment {
    /// Session id, generated server-side at accept time.
    pub id: Uuid,
    /// Client-generated, client-persisted user id.
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    /// Display name, 1–100 characters.
    pub username: String,
}

impl SessionAttachment {
    /// Maximum accepted username length, in characters.
    pub const USERNAME_MAX: usize = 100;

    /// Builds a validated attachment.
    pub fn new(
        id: Uuid,
        user_id: Uuid,
        username: impl Into<String>,
    ) -> Result<Self, ProtocolError> {
        let username = username.into();
        let len = username.chars().count();
        if len == 0 || len > Self::USERNAME_MAX {
            return Err(ProtocolError::InvalidMessage(format!(
                "username must be 1-{} characters, got {len}",
                Self::USERNAME_MAX
            )));
        }
        Ok(Self { id, user_id, username })
    }

    /// Serializes the attachment for storage on a connection.
    #[cfg(feature = "json")]
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(ProtocolError::Encode)
    }

    /// Deserializes and re-validates an attachment recovered from a
    /// connection. Recovery treats any error here as "skip this session".
    #[cfg(feature = "json")]
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        let attachment: Self = serde_json::from_slice(data).map_err(ProtocolError::Decode)?;
        // Bytes may predate the current validation rules; re-check.
        Self::new(attachment.id, attachment.user_id, attachment.username)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A persisted chat or dice-roll record, broadcast to a room.
///
/// Immutable once appended. A pure text message has `formula`, `result`,
/// `rolls`, and `total` all null; a roll that failed evaluation keeps its
/// raw `formula` with null result fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomEvent {
    /// Event id.
    pub id: Uuid,
    /// Epoch milliseconds at which the owning actor created the event.
    pub created_time: i64,
    /// The submitted dice formula, verbatim, if any.
    pub formula: Option<String>,
    /// Human-readable roll summary (e.g. `3d6: [4, 2, 6] = 12`).
    pub result: Option<String>,
    /// Structured roll tree, JSON-encoded as stored. See [`crate::RollEntry`].
    pub rolls: Option<String>,
    /// Roll total, if the formula evaluated.
    pub total: Option<f64>,
    /// Free text, if any.
    pub text: Option<String>,
    /// The submitting user's id (as sent by the client).
    #[serde(rename = "userId")]
    pub user_id: String,
    /// The submitting user's display name.
    pub username: String,
}

// ---------------------------------------------------------------------------
// Chat room envelopes
// ---------------------------------------------------------------------------

/// Client → server messages for a chat/roll room.
///
/// Adjacently tagged: `{"type":"chat","payload":{...}}`. An unknown `type`
/// fails decoding and the frame is dropped with a log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum ClientMessage {
    /// A chat and/or roll submission. `formula` and `text` may each be
    /// null, but a message with both null is still legal — it produces an
    /// empty event rather than an error.
    Chat {
        formula: Option<String>,
        text: Option<String>,
        username: String,
        #[serde(rename = "userId")]
        user_id: String,
    },
}

/// Server → client messages for a chat/roll room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum ServerMessage {
    /// One newly appended event, fanned out to every session.
    Message { message: RoomEvent },
    /// Bounded history replay, sent once immediately after connect,
    /// oldest-first.
    Catchup { messages: Vec<RoomEvent> },
}

// ---------------------------------------------------------------------------
// Counter room envelopes
// ---------------------------------------------------------------------------

/// Client → server messages for the counter variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum CounterClientMessage {
    /// Add the payload to the counter.
    Increment(i64),
    /// Subtract the payload from the counter.
    Decrement(i64),
}

/// Server → client messages for the counter variant: the current value,
/// broadcast after every accepted mutation and on connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum CounterServerMessage {
    Value(i64),
}

// =========================================================================
// Tests
// =========================================================================
