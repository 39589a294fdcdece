/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The socket is not currently open (e.g. mid-retry or already closed).
    #[error("socket not open")]
    NotOpen,

    /// The request reached the endpoint without a WebSocket upgrade.
    #[error("websocket upgrade required")]
    UpgradeRequired,

    /// The upgrade request carried missing or malformed parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Encoding an outbound payload failed.
    #[error("encode failed: {0}")]
    EncodeFailed(#[source] serde_json::Error),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}
