//! Integration tests for the room system: router, actor lifecycle, chat
//! and counter logic, all over the in-memory store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use dicehall_protocol::{
    epoch_millis, ConnectionId, CounterServerMessage, RoomEvent, RoomName, ServerMessage,
};
use dicehall_room::{
    ChatLogic, ConnectionRegistry, CounterLogic, RoomConfig, RoomRouter, TableDice,
};
use dicehall_store::{EventStore, MemoryStore, StoreError, ValueStore};

// =========================================================================
// Helpers
// =========================================================================

fn room(name: &str) -> RoomName {
    RoomName::new(name).unwrap()
}

fn conn(id: u64) -> ConnectionId {
    ConnectionId::new(id)
}

fn user(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

/// A router running chat rooms with a deterministic evaluator.
fn chat_router(
    store: MemoryStore,
    config: RoomConfig,
    seed: u64,
) -> RoomRouter<ChatLogic<MemoryStore, TableDice>> {
    let limit = config.history_limit;
    let max_age = config.retention_max_age;
    RoomRouter::new(config, ConnectionRegistry::new(), move |_room| {
        ChatLogic::new(store.clone(), TableDice::seeded(seed), limit, max_age)
    })
}

/// Connects a fake client and returns its outbound frame stream.
async fn connect(
    router: &RoomRouter<ChatLogic<MemoryStore, TableDice>>,
    name: &RoomName,
    id: u64,
) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    router
        .connect(name, conn(id), user(id as u128), "mira", tx)
        .await
        .expect("connect should succeed");
    rx
}

fn chat_frame(formula: Option<&str>, text: Option<&str>) -> String {
    serde_json::json!({
        "type": "chat",
        "payload": {
            "formula": formula,
            "text": text,
            "username": "mira",
            "userId": "u-1",
        }
    })
    .to_string()
}

async fn next_server_msg(rx: &mut mpsc::UnboundedReceiver<String>) -> ServerMessage {
    let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream should stay open");
    serde_json::from_str(&frame).expect("frame should be a server message")
}

async fn expect_catchup(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<RoomEvent> {
    match next_server_msg(rx).await {
        ServerMessage::Catchup { messages } => messages,
        other => panic!("expected catchup, got {other:?}"),
    }
}

async fn expect_message(rx: &mut mpsc::UnboundedReceiver<String>) -> RoomEvent {
    match next_server_msg(rx).await {
        ServerMessage::Message { message } => message,
        other => panic!("expected message, got {other:?}"),
    }
}

fn stored_event(n: u128, created_time: i64) -> RoomEvent {
    RoomEvent {
        id: Uuid::from_u128(n),
        created_time,
        formula: None,
        result: None,
        rolls: None,
        total: None,
        text: Some(format!("event {n}")),
        user_id: "u-1".into(),
        username: "mira".into(),
    }
}

// =========================================================================
// Chat room
// =========================================================================

#[tokio::test]
async fn test_two_sessions_observe_identical_order() {
    let router = chat_router(MemoryStore::new(), RoomConfig::default(), 1);
    let r = room("goblins");

    let mut rx1 = connect(&router, &r, 1).await;
    let mut rx2 = connect(&router, &r, 2).await;
    assert!(expect_catchup(&mut rx1).await.is_empty());
    assert!(expect_catchup(&mut rx2).await.is_empty());

    for i in 0..10u32 {
        let sender = if i % 2 == 0 { 1 } else { 2 };
        router
            .deliver(conn(sender), chat_frame(None, Some(&format!("msg {i}"))))
            .await
            .unwrap();
    }

    let mut seen1 = Vec::new();
    let mut seen2 = Vec::new();
    for _ in 0..10 {
        seen1.push(expect_message(&mut rx1).await.id);
        seen2.push(expect_message(&mut rx2).await.id);
    }
    assert_eq!(seen1, seen2, "both sessions must observe the same order");
}

#[tokio::test]
async fn test_router_drives_rooms_from_spawned_tasks() {
    // Actors live in spawned tasks and handlers call the router from their
    // own tasks, so the whole command path has to cross task boundaries.
    let router = Arc::new(chat_router(MemoryStore::new(), RoomConfig::default(), 1));
    let r = room("goblins");
    let mut rx = connect(&router, &r, 1).await;
    expect_catchup(&mut rx).await;

    let task = {
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            router
                .deliver(conn(1), chat_frame(None, Some("from a task")))
                .await
        })
    };
    task.await.expect("task should not panic").unwrap();

    let event = expect_message(&mut rx).await;
    assert_eq!(event.text.as_deref(), Some("from a task"));
}

#[tokio::test]
async fn test_catchup_is_newest_100_oldest_first() {
    let store = MemoryStore::new();
    let r = room("goblins");
    for n in 0..150u32 {
        store
            .append(&r, &stored_event(n as u128, n as i64))
            .await
            .unwrap();
    }

    let router = chat_router(store, RoomConfig::default(), 1);
    let mut rx = connect(&router, &r, 1).await;

    let catchup = expect_catchup(&mut rx).await;
    assert_eq!(catchup.len(), 100);
    assert_eq!(catchup[0].created_time, 50, "oldest of the kept tail first");
    assert_eq!(catchup[99].created_time, 149);
}

#[tokio::test]
async fn test_text_only_message_has_null_roll_fields() {
    let router = chat_router(MemoryStore::new(), RoomConfig::default(), 1);
    let r = room("goblins");
    let mut rx = connect(&router, &r, 1).await;
    expect_catchup(&mut rx).await;

    router
        .deliver(conn(1), chat_frame(None, Some("hello")))
        .await
        .unwrap();

    let event = expect_message(&mut rx).await;
    assert_eq!(event.text.as_deref(), Some("hello"));
    assert_eq!(event.formula, None);
    assert_eq!(event.result, None);
    assert_eq!(event.rolls, None);
    assert_eq!(event.total, None);
}

#[tokio::test]
async fn test_roll_total_matches_tree_leaves() {
    let store = MemoryStore::new();
    let router = chat_router(store.clone(), RoomConfig::default(), 42);
    let r = room("goblins");
    let mut rx = connect(&router, &r, 1).await;
    expect_catchup(&mut rx).await;

    router
        .deliver(conn(1), chat_frame(Some("3d6"), None))
        .await
        .unwrap();

    let event = expect_message(&mut rx).await;
    let total = event.total.expect("roll should have a total");
    assert!((3.0..=18.0).contains(&total));
    assert!(event.result.as_deref().unwrap().starts_with("3d6: ["));

    // The stored tree's dice sum to the total.
    let rolls: serde_json::Value = serde_json::from_str(event.rolls.as_deref().unwrap()).unwrap();
    let dice = rolls[0]["rolls"].as_array().unwrap();
    assert_eq!(dice.len(), 3);
    let leaf_sum: f64 = dice.iter().map(|d| d["value"].as_f64().unwrap()).sum();
    assert_eq!(leaf_sum, total);

    // Persisted before broadcast.
    assert_eq!(store.event_count(&r), 1);
}

#[tokio::test]
async fn test_bad_formula_degrades_to_null_result() {
    let router = chat_router(MemoryStore::new(), RoomConfig::default(), 1);
    let r = room("goblins");
    let mut rx = connect(&router, &r, 1).await;
    expect_catchup(&mut rx).await;

    router
        .deliver(conn(1), chat_frame(Some("banana"), Some("lucky roll")))
        .await
        .unwrap();

    let event = expect_message(&mut rx).await;
    assert_eq!(event.formula.as_deref(), Some("banana"), "raw formula kept");
    assert_eq!(event.total, None);
    assert_eq!(event.result, None);
    assert_eq!(event.text.as_deref(), Some("lucky roll"));
}

#[tokio::test]
async fn test_invalid_frame_is_dropped_connection_survives() {
    let router = chat_router(MemoryStore::new(), RoomConfig::default(), 1);
    let r = room("goblins");
    let mut rx = connect(&router, &r, 1).await;
    expect_catchup(&mut rx).await;

    router
        .deliver(conn(1), "{this is not json".to_string())
        .await
        .unwrap();
    router
        .deliver(
            conn(1),
            serde_json::json!({"type": "teleport", "payload": {}}).to_string(),
        )
        .await
        .unwrap();

    // The next valid message still flows; nothing arrived for the bad ones.
    router
        .deliver(conn(1), chat_frame(None, Some("still here")))
        .await
        .unwrap();
    let event = expect_message(&mut rx).await;
    assert_eq!(event.text.as_deref(), Some("still here"));
    assert!(rx.try_recv().is_err(), "invalid frames produced no events");
}

// =========================================================================
// Persist-before-broadcast
// =========================================================================

/// An event store with an injectable append failure.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_appends: Arc<AtomicBool>,
}

impl EventStore for FlakyStore {
    async fn append(&self, room: &RoomName, event: &RoomEvent) -> Result<(), StoreError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        self.inner.append(room, event).await
    }

    async fn tail(&self, room: &RoomName, limit: usize) -> Result<Vec<RoomEvent>, StoreError> {
        self.inner.tail(room, limit).await
    }

    async fn prune_older_than(
        &self,
        room: &RoomName,
        cutoff_millis: i64,
    ) -> Result<usize, StoreError> {
        self.inner.prune_older_than(room, cutoff_millis).await
    }
}

#[tokio::test]
async fn test_append_failure_means_no_broadcast() {
    let store = FlakyStore::default();
    let fail = store.fail_appends.clone();
    let config = RoomConfig::default();
    let limit = config.history_limit;
    let max_age = config.retention_max_age;
    let router = RoomRouter::new(config, ConnectionRegistry::new(), {
        let store = store.clone();
        move |_room| ChatLogic::new(store.clone(), TableDice::seeded(1), limit, max_age)
    });

    let r = room("goblins");
    let (tx, mut rx) = mpsc::unbounded_channel();
    router
        .connect(&r, conn(1), user(1), "mira", tx)
        .await
        .unwrap();
    expect_catchup(&mut rx).await;

    fail.store(true, Ordering::SeqCst);
    router
        .deliver(conn(1), chat_frame(None, Some("lost")))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err(), "failed append must not broadcast");

    fail.store(false, Ordering::SeqCst);
    router
        .deliver(conn(1), chat_frame(None, Some("back")))
        .await
        .unwrap();
    let event = expect_message(&mut rx).await;
    assert_eq!(event.text.as_deref(), Some("back"));
}

// =========================================================================
// Retention
// =========================================================================

#[tokio::test]
async fn test_retention_prunes_expired_events() {
    let store = MemoryStore::new();
    let r = room("goblins");
    let now = epoch_millis();
    // One event two hours old, one fresh; retention keeps only the fresh.
    store.append(&r, &stored_event(1, now - 7_200_000)).await.unwrap();
    store.append(&r, &stored_event(2, now)).await.unwrap();

    let config = RoomConfig {
        retention_max_age: Duration::from_secs(3600),
        retention_interval: Duration::from_millis(50),
        ..RoomConfig::default()
    };
    let router = chat_router(store.clone(), config, 1);
    let mut rx = connect(&router, &r, 1).await;
    assert_eq!(expect_catchup(&mut rx).await.len(), 2);

    // Let the retention timer fire (first tick within two periods).
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(store.event_count(&r), 1);

    // A fresh session's catch-up reflects the pruned history.
    let mut rx2 = connect(&router, &r, 2).await;
    let catchup = expect_catchup(&mut rx2).await;
    assert_eq!(catchup.len(), 1);
    assert_eq!(catchup[0].created_time, now);
}

// =========================================================================
// Eviction and recovery
// =========================================================================

#[tokio::test]
async fn test_eviction_recovery_keeps_sessions_without_duplicate_catchup() {
    let store = MemoryStore::new();
    let config = RoomConfig {
        idle_timeout: Duration::from_millis(100),
        ..RoomConfig::default()
    };
    let router = chat_router(store, config, 1);
    let r = room("goblins");

    let mut rx = connect(&router, &r, 1).await;
    expect_catchup(&mut rx).await;

    router
        .deliver(conn(1), chat_frame(None, Some("before eviction")))
        .await
        .unwrap();
    expect_message(&mut rx).await;

    // Idle long enough for the actor to evict itself.
    tokio::time::sleep(Duration::from_millis(400)).await;

    // Delivering straight to the room forces a respawn; the recovered
    // session receives the broadcast with no second catch-up.
    router
        .deliver(conn(1), chat_frame(None, Some("after eviction")))
        .await
        .unwrap();

    let event = expect_message(&mut rx).await;
    assert_eq!(event.text.as_deref(), Some("after eviction"));
    assert!(
        rx.try_recv().is_err(),
        "recovery must not replay catch-up to surviving sessions"
    );
}

#[tokio::test]
async fn test_history_survives_eviction() {
    let store = MemoryStore::new();
    let config = RoomConfig {
        idle_timeout: Duration::from_millis(100),
        ..RoomConfig::default()
    };
    let router = chat_router(store, config, 1);
    let r = room("goblins");

    let mut rx = connect(&router, &r, 1).await;
    expect_catchup(&mut rx).await;
    router
        .deliver(conn(1), chat_frame(None, Some("durable")))
        .await
        .unwrap();
    expect_message(&mut rx).await;
    router.disconnect(conn(1)).await;

    tokio::time::sleep(Duration::from_millis(400)).await;

    // A brand-new connection to the respawned room replays the history.
    let mut rx2 = connect(&router, &r, 2).await;
    let catchup = expect_catchup(&mut rx2).await;
    assert_eq!(catchup.len(), 1);
    assert_eq!(catchup[0].text.as_deref(), Some("durable"));
}

// =========================================================================
// Counter variant
// =========================================================================

#[tokio::test]
async fn test_counter_round_trip() {
    let store = MemoryStore::new();
    let router = RoomRouter::new(RoomConfig::default(), ConnectionRegistry::new(), {
        let store = store.clone();
        move |_room| CounterLogic::new(store.clone())
    });
    let r = room("tally");

    let (tx1, mut rx1) = mpsc::unbounded_channel();
    router.connect(&r, conn(1), user(1), "mira", tx1).await.unwrap();
    let first: CounterServerMessage = serde_json::from_str(&rx1.recv().await.unwrap()).unwrap();
    assert_eq!(first, CounterServerMessage::Value(0));

    router
        .deliver(
            conn(1),
            serde_json::json!({"type": "increment", "payload": 2}).to_string(),
        )
        .await
        .unwrap();
    let bumped: CounterServerMessage = serde_json::from_str(&rx1.recv().await.unwrap()).unwrap();
    assert_eq!(bumped, CounterServerMessage::Value(2));

    // A second session is greeted with the current value.
    let (tx2, mut rx2) = mpsc::unbounded_channel();
    router.connect(&r, conn(2), user(2), "okan", tx2).await.unwrap();
    let greeted: CounterServerMessage = serde_json::from_str(&rx2.recv().await.unwrap()).unwrap();
    assert_eq!(greeted, CounterServerMessage::Value(2));

    router
        .deliver(
            conn(2),
            serde_json::json!({"type": "decrement", "payload": 1}).to_string(),
        )
        .await
        .unwrap();
    for rx in [&mut rx1, &mut rx2] {
        let value: CounterServerMessage = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(value, CounterServerMessage::Value(1));
    }

    // Written through before the broadcast.
    assert_eq!(store.get(&r).await.unwrap(), 1);
}
