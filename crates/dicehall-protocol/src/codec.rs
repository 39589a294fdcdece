//! Codec trait and implementations for boundary (de)serialization.
//!
//! The rest of the system never calls `serde_json` directly on a wire
//! frame: everything goes through a [`Codec`], so decode failures are
//! funneled into [`ProtocolError`] and handled uniformly (reject-and-log,
//! never trust field presence).

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes Rust types to wire frames and decodes them back.
///
/// The wire unit is a text frame, matching the WebSocket transport.
/// `Send + Sync + 'static` because a codec is stored in long-lived async
/// tasks and may be touched from any runtime thread.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into one text frame.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a text frame back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` for malformed, truncated, or
    /// wrongly-shaped input. Callers on the server side drop the frame and
    /// log; they do not close the connection.
    fn decode<T: DeserializeOwned>(&self, raw: &str) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON via `serde_json`.
///
/// The wire format is JSON text frames end to end (the browser client
/// speaks `JSON.parse`/`JSON.stringify`), so this is the only codec the
/// server ships. The trait still exists so tests can substitute one.
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, raw: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(raw).map_err(ProtocolError::Decode)
    }
}
