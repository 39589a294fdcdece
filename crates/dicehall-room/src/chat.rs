//! Chat/roll room logic.
//!
//! Implements the dice table: inbound chat submissions become immutable
//! events that are persisted first and broadcast second. The newest
//! [`HISTORY_LIMIT`](crate::HISTORY_LIMIT) events are cached in memory and
//! replayed to every freshly accepted session as the catch-up payload.

use std::collections::VecDeque;

use uuid::Uuid;

use dicehall_protocol::{
    epoch_millis, ClientMessage, Codec, ConnectionId, JsonCodec, RoomEvent, ServerMessage,
};
use dicehall_store::EventStore;

use crate::{DiceEvaluator, RoomContext, RoomError, RoomLogic};

/// Room logic for a chat/roll room over an [`EventStore`].
pub struct ChatLogic<S: EventStore, E: DiceEvaluator> {
    store: S,
    evaluator: E,
    history: VecDeque<RoomEvent>,
    history_limit: usize,
    retention_max_age: std::time::Duration,
}

impl<S: EventStore, E: DiceEvaluator> ChatLogic<S, E> {
    pub fn new(
        store: S,
        evaluator: E,
        history_limit: usize,
        retention_max_age: std::time::Duration,
    ) -> Self {
        Self {
            store,
            evaluator,
            history: VecDeque::new(),
            history_limit,
            retention_max_age,
        }
    }

    fn cache_event(&mut self, event: RoomEvent) {
        self.history.push_back(event);
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }

    /// Builds the event for one submission. Evaluation failure degrades to
    /// a null-result event that keeps the raw formula.
    fn build_event(
        &mut self,
        formula: Option<String>,
        text: Option<String>,
        user_id: String,
        username: String,
    ) -> RoomEvent {
        let mut event = RoomEvent {
            id: Uuid::new_v4(),
            created_time: epoch_millis(),
            formula: formula.clone(),
            result: None,
            rolls: None,
            total: None,
            text,
            user_id,
            username,
        };

        if let Some(formula) = formula {
            match self.evaluator.evaluate(&formula) {
                Ok(outcome) => {
                    event.rolls = serde_json::to_string(&outcome.rolls).ok();
                    event.total = Some(outcome.total);
                    event.result = Some(outcome.output);
                }
                Err(e) => {
                    tracing::warn!(formula, error = %e, "formula evaluation failed");
                }
            }
        }

        event
    }
}

impl<S: EventStore, E: DiceEvaluator> RoomLogic for ChatLogic<S, E> {
    async fn warm(&mut self, ctx: &RoomContext<'_>) -> Result<(), RoomError> {
        let tail = self.store.tail(ctx.room, self.history_limit).await?;
        self.history = tail.into();
        tracing::debug!(room = %ctx.room, cached = self.history.len(), "history cache loaded");
        Ok(())
    }

    async fn on_accept(
        &mut self,
        ctx: &RoomContext<'_>,
        conn: ConnectionId,
    ) -> Result<(), RoomError> {
        // Oldest-first, straight from the cache the store tail seeded.
        let catchup = ServerMessage::Catchup {
            messages: self.history.iter().cloned().collect(),
        };
        ctx.send_to(conn, &catchup)
    }

    async fn on_frame(
        &mut self,
        ctx: &RoomContext<'_>,
        _conn: ConnectionId,
        raw: &str,
    ) -> Result<(), RoomError> {
        let msg: ClientMessage = JsonCodec
            .decode(raw)
            .map_err(|e| RoomError::Validation(e.to_string()))?;
        let ClientMessage::Chat {
            formula,
            text,
            username,
            user_id,
        } = msg;

        let name_len = username.chars().count();
        if name_len == 0 || name_len > 100 {
            return Err(RoomError::Validation(format!(
                "username must be 1-100 characters, got {name_len}"
            )));
        }

        // An all-whitespace formula is a pure text message.
        let formula = formula.filter(|f| !f.trim().is_empty());
        let event = self.build_event(formula, text, user_id, username);

        // Persist before broadcast: a storage failure means nobody sees
        // the event, rather than sessions seeing what history lost.
        self.store.append(ctx.room, &event).await?;
        self.cache_event(event.clone());

        ctx.broadcast(&ServerMessage::Message { message: event })
    }

    async fn on_retention(&mut self, ctx: &RoomContext<'_>) -> Result<(), RoomError> {
        let cutoff = epoch_millis() - self.retention_max_age.as_millis() as i64;
        let dropped = self.store.prune_older_than(ctx.room, cutoff).await?;
        if dropped > 0 {
            // Rebuild the cache so catch-up matches what storage kept.
            let tail = self.store.tail(ctx.room, self.history_limit).await?;
            self.history = tail.into();
            tracing::info!(room = %ctx.room, dropped, "pruned expired events");
        }
        Ok(())
    }
}
