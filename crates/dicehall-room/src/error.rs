//! Error types for the room layer.

use dicehall_protocol::RoomName;
use dicehall_store::StoreError;

/// Errors that can occur during room operations.
///
/// Bad client input never terminates an actor; `Validation` and `Eval`
/// failures are logged and the connection stays open. `Store` is the one
/// hard failure on the write path.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The inbound frame failed schema validation.
    #[error("invalid message: {0}")]
    Validation(String),

    /// The storage backend refused an operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An outbound payload failed to encode.
    #[error(transparent)]
    Protocol(#[from] dicehall_protocol::ProtocolError),

    /// The room's command channel is closed (actor evicted or crashed).
    #[error("{0} is unavailable")]
    Unavailable(RoomName),
}
