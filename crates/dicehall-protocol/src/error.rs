//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding, or validating messages.
///
/// A `ProtocolError` always means the problem is in the bytes or their
/// shape — never in networking or room state. Malformed client input maps
/// here and is dropped with a log line by the caller; it must never tear
/// down an actor or a connection.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, wrong types,
    /// or an unrecognized `type` tag.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message parsed but violates a protocol rule — e.g. a username
    /// outside the 1–100 character range or an empty room name.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
