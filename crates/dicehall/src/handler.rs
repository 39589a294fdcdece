//! Per-connection handler: registration, frame pumping, teardown.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register with the router → the room actor accepts the session and
//!      queues the catch-up payload
//!   2. Pump: outbound frames → socket; inbound frames → router
//!   3. On close or error → disconnect and drop the registry entry
//!
//! Keepalive requests are answered inline here; the room actor never wakes
//! for them.

use std::sync::Arc;

use tokio::sync::mpsc;

use dicehall_protocol::{KEEPALIVE_REQUEST, KEEPALIVE_RESPONSE};
use dicehall_room::{RoomLogic, RoomRouter};
use dicehall_transport::{ConnectParams, Connection, WebSocketConnection};

use crate::DicehallError;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<L: RoomLogic>(
    conn: WebSocketConnection,
    params: ConnectParams,
    router: Arc<RoomRouter<L>>,
) -> Result<(), DicehallError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, room = %params.room, "handling new connection");

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    if let Err(e) = router
        .connect(
            &params.room,
            conn_id,
            params.user_id,
            &params.username,
            outbound_tx,
        )
        .await
    {
        // The registry entry was created before the accept failed.
        router.disconnect(conn_id).await;
        let _ = conn.close().await;
        return Err(e.into());
    }

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => match frame {
                Some(frame) => {
                    if conn.send(&frame).await.is_err() {
                        break;
                    }
                }
                // Registry entry gone; nothing will ever be queued again.
                None => break,
            },
            inbound = conn.recv() => match inbound {
                Ok(Some(text)) => {
                    if text == KEEPALIVE_REQUEST {
                        if conn.send(KEEPALIVE_RESPONSE).await.is_err() {
                            break;
                        }
                    } else if let Err(e) = router.deliver(conn_id, text).await {
                        tracing::warn!(%conn_id, error = %e, "frame delivery failed");
                    }
                }
                Ok(None) => {
                    tracing::debug!(%conn_id, "connection closed cleanly");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "receive error");
                    break;
                }
            }
        }
    }

    // Errors tear down exactly like closes.
    router.disconnect(conn_id).await;
    let _ = conn.close().await;
    Ok(())
}
