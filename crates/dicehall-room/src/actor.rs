//! Room actor: an isolated Tokio task that owns one room.
//!
//! Each room name maps to at most one running actor. The actor is the
//! room's single writer: every append and broadcast flows through its
//! command loop, so any two sessions observe the same event order and no
//! two storage operations for the same room ever overlap.
//!
//! Instances are disposable. An actor with no traffic evicts itself after
//! the idle timeout; the router spawns a fresh one on the next command,
//! and warm-up rebuilds the session map from the attachments parked in the
//! connection registry.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use dicehall_protocol::{ConnectionId, RoomName, SessionAttachment};

use crate::{ConnectionRegistry, RoomConfig, RoomContext, RoomError, RoomLogic};

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    /// Register a new session and send it the initial payload.
    Accept {
        conn: ConnectionId,
        user_id: Uuid,
        username: String,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Deliver one raw inbound frame from a connection.
    Frame { conn: ConnectionId, raw: String },

    /// The connection closed or errored; drop its session.
    Closed { conn: ConnectionId },
}

/// Handle to a running room actor. Cheap to clone.
///
/// Every method reports [`RoomError::Unavailable`] when the actor has been
/// evicted; the router reacts by respawning and retrying once.
#[derive(Clone)]
pub struct RoomHandle {
    room: RoomName,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// The room this handle commands.
    pub fn room(&self) -> &RoomName {
        &self.room
    }

    /// Registers a session and waits for the accept to complete (the
    /// catch-up payload is queued before this returns).
    pub async fn accept(
        &self,
        conn: ConnectionId,
        user_id: Uuid,
        username: &str,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Accept {
                conn,
                user_id,
                username: username.to_owned(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room.clone()))?
    }

    /// Delivers one inbound frame (fire-and-forget).
    pub async fn frame(&self, conn: ConnectionId, raw: String) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Frame { conn, raw })
            .await
            .map_err(|_| RoomError::Unavailable(self.room.clone()))
    }

    /// Reports a closed or errored connection.
    pub async fn closed(&self, conn: ConnectionId) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Closed { conn })
            .await
            .map_err(|_| RoomError::Unavailable(self.room.clone()))
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<L: RoomLogic> {
    room: RoomName,
    config: RoomConfig,
    registry: ConnectionRegistry,
    sessions: HashMap<ConnectionId, SessionAttachment>,
    logic: L,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl<L: RoomLogic> RoomActor<L> {
    /// Runs the actor from warm-up to eviction.
    async fn run(mut self) {
        tracing::info!(room = %self.room, "room actor warming");

        self.recover();
        {
            let ctx = RoomContext {
                room: &self.room,
                registry: &self.registry,
                sessions: &self.sessions,
            };
            if let Err(e) = self.logic.warm(&ctx).await {
                tracing::warn!(
                    room = %self.room,
                    error = %e,
                    "warm-up load failed, serving with empty cache"
                );
            }
        }

        tracing::info!(
            room = %self.room,
            sessions = self.sessions.len(),
            "room actor active"
        );

        // First retention tick is pushed out by a random fraction of one
        // period so rooms created together don't all prune at once.
        let period = self.config.retention_interval;
        let jitter = Duration::from_millis(
            rand::rng().random_range(0..(period.as_millis().max(1) as u64)),
        );
        let mut retention =
            tokio::time::interval_at(tokio::time::Instant::now() + period + jitter, period);

        let idle = tokio::time::sleep(self.config.idle_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => {
                        self.handle(cmd).await;
                        idle.as_mut()
                            .reset(tokio::time::Instant::now() + self.config.idle_timeout);
                    }
                    None => break,
                },
                _ = retention.tick() => {
                    let ctx = RoomContext {
                        room: &self.room,
                        registry: &self.registry,
                        sessions: &self.sessions,
                    };
                    if let Err(e) = self.logic.on_retention(&ctx).await {
                        tracing::warn!(room = %self.room, error = %e, "retention pass failed");
                    }
                }
                _ = &mut idle => {
                    tracing::info!(room = %self.room, "idle timeout, evicting actor");
                    break;
                }
            }
        }

        tracing::info!(room = %self.room, "room actor stopped");
    }

    /// Rebuilds the session map from registry attachments. Recovered
    /// sessions get no catch-up replay; they already had one on accept.
    fn recover(&mut self) {
        for (conn, attachment) in self.registry.room_connections(&self.room) {
            // No attachment yet means the connection's Accept command is
            // still in flight; it will register itself normally.
            let Some(bytes) = attachment else { continue };
            match SessionAttachment::from_bytes(&bytes) {
                Ok(attachment) => {
                    self.sessions.insert(conn, attachment);
                }
                Err(e) => {
                    tracing::warn!(
                        room = %self.room,
                        %conn,
                        error = %e,
                        "skipping connection with undecodable attachment"
                    );
                }
            }
        }
    }

    async fn handle(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Accept {
                conn,
                user_id,
                username,
                reply,
            } => {
                let result = self.handle_accept(conn, user_id, &username).await;
                let _ = reply.send(result);
            }
            RoomCommand::Frame { conn, raw } => {
                if !self.sessions.contains_key(&conn) {
                    tracing::warn!(
                        room = %self.room,
                        %conn,
                        "frame from unregistered connection, ignoring"
                    );
                    return;
                }
                let ctx = RoomContext {
                    room: &self.room,
                    registry: &self.registry,
                    sessions: &self.sessions,
                };
                if let Err(e) = self.logic.on_frame(&ctx, conn, &raw).await {
                    match e {
                        RoomError::Validation(reason) => {
                            tracing::warn!(room = %self.room, %conn, reason, "dropping invalid frame");
                        }
                        other => {
                            tracing::warn!(room = %self.room, %conn, error = %other, "frame handling failed");
                        }
                    }
                }
            }
            RoomCommand::Closed { conn } => {
                if self.sessions.remove(&conn).is_some() {
                    tracing::debug!(
                        room = %self.room,
                        %conn,
                        sessions = self.sessions.len(),
                        "session closed"
                    );
                }
            }
        }
    }

    async fn handle_accept(
        &mut self,
        conn: ConnectionId,
        user_id: Uuid,
        username: &str,
    ) -> Result<(), RoomError> {
        // A reconnecting transport may reuse the registry entry; keep the
        // prior attachment so the session id stays stable.
        let prior = self
            .registry
            .attachment(conn)
            .and_then(|bytes| SessionAttachment::from_bytes(&bytes).ok());
        let attachment = match prior {
            Some(attachment) => attachment,
            None => {
                let attachment = SessionAttachment::new(Uuid::new_v4(), user_id, username)
                    .map_err(|e| RoomError::Validation(e.to_string()))?;
                let bytes = attachment
                    .to_bytes()
                    .map_err(|e| RoomError::Validation(e.to_string()))?;
                self.registry.set_attachment(conn, bytes);
                attachment
            }
        };

        tracing::info!(
            room = %self.room,
            %conn,
            username = %attachment.username,
            "session accepted"
        );
        self.sessions.insert(conn, attachment);

        let ctx = RoomContext {
            room: &self.room,
            registry: &self.registry,
            sessions: &self.sessions,
        };
        self.logic.on_accept(&ctx, conn).await
    }
}

/// Spawns a new room actor task and returns a handle to command it.
pub(crate) fn spawn_room<L: RoomLogic>(
    room: RoomName,
    config: RoomConfig,
    registry: ConnectionRegistry,
    logic: L,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size);

    let actor = RoomActor {
        room: room.clone(),
        config,
        registry,
        sessions: HashMap::new(),
        logic,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle { room, sender: tx }
}
