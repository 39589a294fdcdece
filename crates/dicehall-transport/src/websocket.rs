//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Connection parameters ride on the upgrade request's query string
//! (`roomName`, `userId`, `username`). A request with missing or malformed
//! parameters is refused during the handshake with a 400 response; a plain
//! HTTP request without an upgrade surfaces as
//! [`TransportError::UpgradeRequired`].

use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{self, Message};
use uuid::Uuid;

use dicehall_protocol::{ConnectionId, RoomName, SessionAttachment};

use crate::{ConnectParams, Connection, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<(Self::Connection, ConnectParams), Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let mut params: Option<ConnectParams> = None;
        let mut rejection: Option<String> = None;
        let handshake = tokio_tungstenite::accept_hdr_async(
            stream,
            |req: &Request, resp: Response| match parse_connect_params(req.uri().query()) {
                Ok(parsed) => {
                    params = Some(parsed);
                    Ok(resp)
                }
                Err(reason) => {
                    rejection = Some(reason.clone());
                    let mut refusal = ErrorResponse::new(Some(reason));
                    *refusal.status_mut() = StatusCode::BAD_REQUEST;
                    Err(refusal)
                }
            },
        )
        .await;

        let ws = match handshake {
            Ok(ws) => ws,
            Err(e) => {
                if let Some(reason) = rejection {
                    tracing::debug!(%addr, reason, "refused upgrade request");
                    return Err(TransportError::BadRequest(reason));
                }
                return Err(match e {
                    tungstenite::Error::Protocol(_) => TransportError::UpgradeRequired,
                    other => TransportError::AcceptFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        other,
                    )),
                });
            }
        };

        // The callback always runs before the handshake completes.
        let params = params
            .ok_or_else(|| TransportError::BadRequest("missing connect parameters".into()))?;

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %addr, room = %params.room, "accepted WebSocket connection");

        let (sink, stream) = ws.split();
        Ok((
            WebSocketConnection {
                id,
                sink: Mutex::new(sink),
                stream: Mutex::new(stream),
            },
            params,
        ))
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Extracts and validates the connect parameters from an upgrade query.
fn parse_connect_params(query: Option<&str>) -> Result<ConnectParams, String> {
    let query = query.ok_or("missing query string")?;

    let mut room = None;
    let mut user_id = None;
    let mut username = None;
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = percent_decode(value);
        match key {
            "roomName" => room = Some(value),
            "userId" => user_id = Some(value),
            "username" => username = Some(value),
            _ => {}
        }
    }

    let room = RoomName::new(room.ok_or("missing roomName")?)
        .map_err(|e| format!("invalid roomName: {e}"))?;
    let user_id = Uuid::parse_str(&user_id.ok_or("missing userId")?)
        .map_err(|e| format!("invalid userId: {e}"))?;
    let username = username.ok_or("missing username")?;
    let chars = username.chars().count();
    if chars == 0 || chars > SessionAttachment::USERNAME_MAX {
        return Err(format!(
            "username must be 1-{} characters",
            SessionAttachment::USERNAME_MAX
        ));
    }

    Ok(ConnectParams {
        room,
        user_id,
        username,
    })
}

/// Minimal percent-decoding for query values; `+` reads as a space.
fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                match hex {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// A single accepted WebSocket connection, exchanging text frames.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, text: &str) -> Result<(), Self::Error> {
        let msg = Message::Text(text.to_owned().into());
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
        })
    }

    async fn recv(&self) -> Result<Option<String>, Self::Error> {
        loop {
            let msg = self.stream.lock().await.next().await;
            match msg {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.to_string())),
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(String::from_utf8_lossy(&data).into_owned()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip protocol ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connect_params_happy_path() {
        let query = "roomName=goblins&userId=00000000-0000-0000-0000-000000000001&username=mira";
        let params = parse_connect_params(Some(query)).unwrap();
        assert_eq!(params.room.as_str(), "goblins");
        assert_eq!(params.username, "mira");
    }

    #[test]
    fn test_parse_connect_params_decodes_escapes() {
        let query =
            "roomName=goblins&userId=00000000-0000-0000-0000-000000000001&username=mira%20k";
        let params = parse_connect_params(Some(query)).unwrap();
        assert_eq!(params.username, "mira k");
    }

    #[test]
    fn test_parse_connect_params_missing_field() {
        let query = "roomName=goblins&username=mira";
        let err = parse_connect_params(Some(query)).unwrap_err();
        assert!(err.contains("userId"));
    }

    #[test]
    fn test_parse_connect_params_bad_user_id() {
        let query = "roomName=goblins&userId=not-a-uuid&username=mira";
        assert!(parse_connect_params(Some(query)).is_err());
    }

    #[test]
    fn test_parse_connect_params_no_query() {
        assert!(parse_connect_params(None).is_err());
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("a%20b+c"), "a b c");
        assert_eq!(percent_decode("plain"), "plain");
        assert_eq!(percent_decode("trailing%2"), "trailing%2");
    }
}
