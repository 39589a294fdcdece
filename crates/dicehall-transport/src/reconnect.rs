//! Self-healing client socket.
//!
//! [`ReconnectingSocket`] wraps a WebSocket client connection and re-dials
//! on loss with exponential backoff. Callers hold a handle that stays valid
//! across reconnects; link transitions arrive on an event channel so the
//! application can re-request catch-up after each `Open`.
//!
//! An optional keepalive timer sends the raw keepalive request frame at a
//! fixed period and swallows the matching response before it reaches the
//! application. The token pair defaults to [`KEEPALIVE_REQUEST`] /
//! [`KEEPALIVE_RESPONSE`].

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::Message;

use dicehall_protocol::{KEEPALIVE_REQUEST, KEEPALIVE_RESPONSE};

use crate::TransportError;

type WsClientStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Retry and keepalive tuning for a [`ReconnectingSocket`].
#[derive(Debug, Clone)]
pub struct ReconnectOptions {
    /// Base delay before the first reconnect attempt; doubles per failure.
    pub retry_delay: Duration,
    /// Give up after this many consecutive failures. `None` retries forever.
    pub max_retries: Option<u32>,
    /// Send a keepalive frame at this period while open. `None` disables.
    pub keepalive_interval: Option<Duration>,
    /// Subprotocols offered on the upgrade request, most preferred first.
    pub protocols: Vec<String>,
    /// Keepalive `(request, response)` token pair, exchanged as raw text
    /// frames. The response token never reaches the application.
    pub keepalive_tokens: (String, String),
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(1),
            max_retries: None,
            keepalive_interval: None,
            protocols: Vec::new(),
            keepalive_tokens: (KEEPALIVE_REQUEST.to_owned(), KEEPALIVE_RESPONSE.to_owned()),
        }
    }
}

/// Link transitions and inbound messages, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The socket is open (first connect or any reconnect). State that
    /// depends on the session, like catch-up, must be re-requested now.
    Open,
    /// One inbound text frame. Keepalive responses never appear here.
    Message(String),
    /// The current connection ended.
    Closed,
    /// A reconnect attempt is scheduled after `delay`.
    Retrying { attempt: u32, delay: Duration },
    /// Retries are exhausted; the socket is permanently closed.
    GaveUp,
}

/// Coarse link state, readable at any time without draining events.
///
/// `Closed` means the caller closed the socket; `GaveUp` means retries
/// were exhausted. Both are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Open,
    Retrying,
    Closed,
    GaveUp,
}

/// Delay before reconnect attempt number `failures + 1`.
///
/// Doubles per consecutive failure and saturates instead of overflowing,
/// so a long outage cannot panic the backoff math.
pub fn backoff_delay(base: Duration, failures: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(failures))
}

enum Cmd {
    Send(String),
    Close,
}

/// A client socket handle that survives reconnects.
pub struct ReconnectingSocket {
    cmd_tx: mpsc::UnboundedSender<Cmd>,
    state_rx: watch::Receiver<LinkState>,
}

impl ReconnectingSocket {
    /// Starts dialing `url` and returns the handle plus its event stream.
    ///
    /// Returns immediately; the first [`ClientEvent::Open`] signals the
    /// handshake completed. Must be called within a Tokio runtime.
    pub fn connect(
        url: impl Into<String>,
        options: ReconnectOptions,
    ) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(LinkState::Connecting);
        tokio::spawn(drive(url.into(), options, cmd_rx, event_tx, state_tx));
        (Self { cmd_tx, state_rx }, event_rx)
    }

    /// Queues one text frame. Frames queued while the link is down are
    /// dropped, not buffered; the error case is a permanently closed socket.
    pub fn send(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.cmd_tx
            .send(Cmd::Send(text.into()))
            .map_err(|_| TransportError::NotOpen)
    }

    /// Serializes `value` as JSON and queues it.
    pub fn send_json<T: Serialize>(&self, value: &T) -> Result<(), TransportError> {
        let text = serde_json::to_string(value).map_err(TransportError::EncodeFailed)?;
        self.send(text)
    }

    /// Current link state.
    pub fn state(&self) -> LinkState {
        *self.state_rx.borrow()
    }

    /// Closes the socket and cancels any pending retry. Idempotent.
    pub fn close(&self) {
        let _ = self.cmd_tx.send(Cmd::Close);
    }
}

#[derive(PartialEq)]
enum SessionEnd {
    Lost,
    ClosedByUser,
}

async fn drive(
    url: String,
    options: ReconnectOptions,
    mut cmd_rx: mpsc::UnboundedReceiver<Cmd>,
    event_tx: mpsc::UnboundedSender<ClientEvent>,
    state_tx: watch::Sender<LinkState>,
) {
    let mut failures: u32 = 0;
    loop {
        let _ = state_tx.send(LinkState::Connecting);
        // A request that cannot be built never will be; retrying is useless.
        let Some(request) = upgrade_request(&url, &options.protocols) else {
            tracing::warn!(url, "invalid url or protocol list, not connecting");
            let _ = event_tx.send(ClientEvent::GaveUp);
            let _ = state_tx.send(LinkState::GaveUp);
            return;
        };
        match tokio_tungstenite::connect_async(request).await {
            Ok((ws, _)) => {
                failures = 0;
                let _ = state_tx.send(LinkState::Open);
                let _ = event_tx.send(ClientEvent::Open);

                let end = run_open(ws, &options, &mut cmd_rx, &event_tx).await;
                let _ = event_tx.send(ClientEvent::Closed);
                if end == SessionEnd::ClosedByUser {
                    let _ = state_tx.send(LinkState::Closed);
                    return;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, url, "connect attempt failed");
            }
        }

        if let Some(max) = options.max_retries {
            if failures >= max {
                tracing::warn!(url, failures, "giving up on reconnect");
                let _ = event_tx.send(ClientEvent::GaveUp);
                let _ = state_tx.send(LinkState::GaveUp);
                return;
            }
        }

        let delay = backoff_delay(options.retry_delay, failures);
        failures += 1;
        let _ = state_tx.send(LinkState::Retrying);
        let _ = event_tx.send(ClientEvent::Retrying {
            attempt: failures,
            delay,
        });
        tracing::debug!(attempt = failures, ?delay, url, "reconnecting after delay");

        if !sleep_unless_closed(delay, &mut cmd_rx).await {
            let _ = event_tx.send(ClientEvent::Closed);
            let _ = state_tx.send(LinkState::Closed);
            return;
        }
    }
}

/// Builds the upgrade request, offering subprotocols when configured.
fn upgrade_request(url: &str, protocols: &[String]) -> Option<Request> {
    let mut request = url.into_client_request().ok()?;
    if !protocols.is_empty() {
        let offered = HeaderValue::from_str(&protocols.join(", ")).ok()?;
        request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, offered);
    }
    Some(request)
}

/// One open session, from handshake to loss or user close.
async fn run_open(
    ws: WsClientStream,
    options: &ReconnectOptions,
    cmd_rx: &mut mpsc::UnboundedReceiver<Cmd>,
    event_tx: &mpsc::UnboundedSender<ClientEvent>,
) -> SessionEnd {
    let (request_token, response_token) = &options.keepalive_tokens;
    let (mut sink, mut stream) = ws.split();
    let mut keepalive = options.keepalive_interval.map(|period| {
        tokio::time::interval_at(tokio::time::Instant::now() + period, period)
    });

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(Cmd::Send(text)) => {
                    if sink.send(Message::text(text)).await.is_err() {
                        return SessionEnd::Lost;
                    }
                }
                Some(Cmd::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return SessionEnd::ClosedByUser;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    // The keepalive response never reaches the application.
                    if text.as_str() == response_token.as_str() {
                        continue;
                    }
                    let _ = event_tx.send(ClientEvent::Message(text.to_string()));
                }
                Some(Ok(Message::Close(_))) | None => return SessionEnd::Lost,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "socket error");
                    return SessionEnd::Lost;
                }
            },
            _ = next_keepalive(&mut keepalive) => {
                if sink.send(Message::text(request_token.clone())).await.is_err() {
                    return SessionEnd::Lost;
                }
            }
        }
    }
}

async fn next_keepalive(interval: &mut Option<tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Waits out a backoff delay. Sends arriving meanwhile are dropped;
/// returns `false` if the user closed the socket during the wait.
async fn sleep_unless_closed(delay: Duration, cmd_rx: &mut mpsc::UnboundedReceiver<Cmd>) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            cmd = cmd_rx.recv() => match cmd {
                Some(Cmd::Send(_)) => {
                    tracing::debug!("dropping outbound frame while disconnected");
                }
                Some(Cmd::Close) | None => return false,
            }
        }
    }
}
