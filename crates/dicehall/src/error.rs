//! Unified error type for the Dicehall stack.

use dicehall_protocol::ProtocolError;
use dicehall_room::RoomError;
use dicehall_store::StoreError;
use dicehall_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `dicehall` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum DicehallError {
    /// A transport-level error (accept, send, recv, reconnect).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (validation, unavailable actor).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A storage-level error.
    #[error(transparent)]
    Store(#[from] StoreError),
}
