//! Wire protocol for Dicehall.
//!
//! Everything that travels between a client and a room — chat/roll
//! submissions, broadcast events, catch-up payloads, the session identity
//! attachment, and the structured roll-result tree — is defined here and
//! validated here. Nothing outside this crate parses raw frames.
//!
//! # Key types
//!
//! - [`ClientMessage`] / [`ServerMessage`] — the chat room envelopes
//! - [`CounterClientMessage`] / [`CounterServerMessage`] — the counter variant
//! - [`RoomEvent`] — the persisted, broadcast chat/roll record
//! - [`SessionAttachment`] — the identity tuple carried on a connection
//! - [`RollEntry`] — the recursive roll-result tree
//! - [`Codec`] / [`JsonCodec`] — boundary (de)serialization

mod codec;
mod error;
mod rolls;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use rolls::{modifier, DiceGroup, DieRoll, RollEntry, RollGroup, StructuredRolls};
pub use types::{
    epoch_millis, ClientMessage, ConnectionId, CounterClientMessage, CounterServerMessage,
    RoomEvent, RoomName, ServerMessage, SessionAttachment, KEEPALIVE_REQUEST, KEEPALIVE_RESPONSE,
};
