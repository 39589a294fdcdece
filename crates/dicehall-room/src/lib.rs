//! Room coordination for Dicehall.
//!
//! A room is a named, single-writer coordination point: one Tokio task per
//! room name owns the session map and serializes every persist-and-
//! broadcast, which is the whole ordering story. Actor instances are
//! disposable; identity lives in the shared [`ConnectionRegistry`] and
//! history lives in the store, so eviction and respawn are invisible to
//! clients beyond latency.
//!
//! Two [`RoomLogic`] implementations ship: [`ChatLogic`] (the dice table)
//! and [`CounterLogic`] (a shared durable integer).

mod actor;
mod chat;
mod config;
mod counter;
mod error;
mod eval;
mod logic;
mod registry;
mod router;

pub use actor::RoomHandle;
pub use chat::ChatLogic;
pub use config::{RoomConfig, HISTORY_LIMIT};
pub use counter::CounterLogic;
pub use error::RoomError;
pub use eval::{DiceEvaluator, EvalError, RollOutcome, TableDice};
pub use logic::{RoomContext, RoomLogic};
pub use registry::ConnectionRegistry;
pub use router::RoomRouter;
