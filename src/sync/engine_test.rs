use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use crate::common::{ChatCommand, ChatEvent, ChatMessage};
use crate::store::{
    MessageStore, StoreError, Subscription, SubscriptionEvent, SubscriptionHandle,
};

use super::SyncEngine;

const WAIT: Duration = Duration::from_secs(5);

// ----------------------------------------------------------------
// In-memory store double
// ----------------------------------------------------------------

#[derive(Clone, Default)]
struct FakeStore {
    inner: Arc<Mutex<FakeInner>>,
}

#[derive(Default)]
struct FakeInner {
    history: HashMap<String, HistoryScript>,
    subscriptions: Vec<FakeSubscription>,
    sent: Vec<SentRow>,
    authenticated: bool,
}

enum HistoryScript {
    Ready(Result<Vec<ChatMessage>, StoreError>),
    Wait(oneshot::Receiver<Result<Vec<ChatMessage>, StoreError>>),
}

struct FakeSubscription {
    room: String,
    events: mpsc::Sender<SubscriptionEvent>,
    closed: Arc<AtomicBool>,
    /// Rooms whose subscriptions were still open when this one was created.
    open_at_creation: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct SentRow {
    room: String,
    username: String,
    content: String,
}

impl FakeStore {
    fn new() -> Self {
        let store = Self::default();
        store.inner.lock().unwrap().authenticated = true;
        store
    }

    fn set_authenticated(&self, authenticated: bool) {
        self.inner.lock().unwrap().authenticated = authenticated;
    }

    fn stage_history(&self, room: &str, rows: Vec<ChatMessage>) {
        self.inner
            .lock()
            .unwrap()
            .history
            .insert(room.to_string(), HistoryScript::Ready(Ok(rows)));
    }

    fn stage_history_error(&self, room: &str) {
        self.inner.lock().unwrap().history.insert(
            room.to_string(),
            HistoryScript::Ready(Err(StoreError::Unavailable("backend down".to_string()))),
        );
    }

    /// History for `room` blocks until the returned sender resolves it.
    fn stage_history_pending(
        &self,
        room: &str,
    ) -> oneshot::Sender<Result<Vec<ChatMessage>, StoreError>> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .lock()
            .unwrap()
            .history
            .insert(room.to_string(), HistoryScript::Wait(rx));
        tx
    }

    async fn join(&self, room: &str) {
        let _ = self.subscription_sender(room).send(SubscriptionEvent::Joined).await;
    }

    async fn push_insert(&self, room: &str, message: ChatMessage) {
        let _ = self
            .subscription_sender(room)
            .send(SubscriptionEvent::Insert(message))
            .await;
    }

    async fn push_lost(&self, room: &str) {
        let _ = self
            .subscription_sender(room)
            .send(SubscriptionEvent::Lost(StoreError::Unavailable(
                "socket dropped".to_string(),
            )))
            .await;
    }

    /// Sender feeding the most recent subscription opened for `room`.
    fn subscription_sender(&self, room: &str) -> mpsc::Sender<SubscriptionEvent> {
        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .rev()
            .find(|sub| sub.room == room)
            .map(|sub| sub.events.clone())
            .expect("no subscription opened for room")
    }

    fn subscription_state(&self) -> Vec<(String, bool, Vec<String>)> {
        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .map(|sub| {
                (
                    sub.room.clone(),
                    sub.closed.load(Ordering::SeqCst),
                    sub.open_at_creation.clone(),
                )
            })
            .collect()
    }

    fn sent(&self) -> Vec<SentRow> {
        self.inner.lock().unwrap().sent.clone()
    }
}

impl MessageStore for FakeStore {
    async fn fetch_history(&self, room: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let script = self.inner.lock().unwrap().history.remove(room);
        match script {
            None => Ok(Vec::new()),
            Some(HistoryScript::Ready(result)) => result,
            Some(HistoryScript::Wait(rx)) => rx.await.unwrap_or_else(|_| Ok(Vec::new())),
        }
    }

    fn subscribe(&self, room: &str) -> Subscription {
        let (events_tx, events_rx) = mpsc::channel(16);
        let handle = SubscriptionHandle::new(tokio::spawn(std::future::pending::<()>()));

        let mut inner = self.inner.lock().unwrap();
        let open_at_creation = inner
            .subscriptions
            .iter()
            .filter(|sub| !sub.closed.load(Ordering::SeqCst))
            .map(|sub| sub.room.clone())
            .collect();
        inner.subscriptions.push(FakeSubscription {
            room: room.to_string(),
            events: events_tx,
            closed: handle.closed_flag(),
            open_at_creation,
        });

        Subscription { events: events_rx, handle }
    }

    async fn send(&self, room: &str, username: &str, content: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.authenticated {
            return Err(StoreError::Unauthenticated);
        }
        inner.sent.push(SentRow {
            room: room.to_string(),
            username: username.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }
}

// ----------------------------------------------------------------
// Harness
// ----------------------------------------------------------------

struct Harness {
    commands: mpsc::Sender<ChatCommand>,
    events: mpsc::Receiver<ChatEvent>,
}

fn spawn_engine(store: FakeStore) -> Harness {
    let (command_tx, command_rx) = mpsc::channel(16);
    let (event_tx, event_rx) = mpsc::channel(64);
    tokio::spawn(SyncEngine::new(store, command_rx, event_tx).run());
    Harness { commands: command_tx, events: event_rx }
}

impl Harness {
    async fn bind(&self, room: &str, username: &str) {
        self.commands
            .send(ChatCommand::Bind { room: room.to_string(), username: username.to_string() })
            .await
            .unwrap();
    }

    async fn send(&self, content: &str) {
        self.commands
            .send(ChatCommand::Send { content: content.to_string() })
            .await
            .unwrap();
    }

    async fn next_event(&mut self) -> ChatEvent {
        timeout(WAIT, self.events.recv())
            .await
            .expect("timed out waiting for engine event")
            .expect("engine stopped")
    }

    /// Next visible sequence, skipping other event kinds.
    async fn next_view(&mut self) -> Vec<ChatMessage> {
        loop {
            if let ChatEvent::MessagesChanged(view) = self.next_event().await {
                return view;
            }
        }
    }

    async fn await_connected(&mut self) {
        loop {
            if let ChatEvent::Connected { .. } = self.next_event().await {
                return;
            }
        }
    }

    async fn next_send_failed(&mut self) -> String {
        loop {
            if let ChatEvent::SendFailed { reason } = self.next_event().await {
                return reason;
            }
        }
    }

    async fn next_degraded(&mut self) -> String {
        loop {
            if let ChatEvent::StoreDegraded { detail } = self.next_event().await {
                return detail;
            }
        }
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never became true");
}

fn msg(id: &str, created_at: &str, room: &str, content: &str) -> ChatMessage {
    ChatMessage {
        id: id.to_string(),
        content: content.to_string(),
        created_at: created_at.to_string(),
        room: room.to_string(),
        username: "users".to_string(),
        user_id: "u-1".to_string(),
    }
}

fn contents(view: &[ChatMessage]) -> Vec<&str> {
    view.iter().map(|m| m.content.as_str()).collect()
}

fn ids(view: &[ChatMessage]) -> Vec<&str> {
    view.iter().map(|m| m.id.as_str()).collect()
}

// ----------------------------------------------------------------
// Scenarios
// ----------------------------------------------------------------

#[tokio::test]
async fn history_then_live_insert_in_order() {
    let store = FakeStore::new();
    store.stage_history("5", vec![msg("1", "2024-01-01T10:00:00Z", "5", "hi")]);
    let mut h = spawn_engine(store.clone());

    h.bind("5", "users").await;
    assert!(h.next_view().await.is_empty(), "bind starts with an empty view");
    assert_eq!(contents(&h.next_view().await), vec!["hi"]);

    store.join("5").await;
    h.await_connected().await;

    store.push_insert("5", msg("2", "2024-01-01T10:00:05Z", "5", "yo")).await;
    assert_eq!(contents(&h.next_view().await), vec!["hi", "yo"]);
}

#[tokio::test]
async fn live_echo_racing_history_yields_one_entry() {
    let store = FakeStore::new();
    let resolve = store.stage_history_pending("5");
    let mut h = spawn_engine(store.clone());

    h.bind("5", "users").await;
    assert!(h.next_view().await.is_empty());

    // The live feed wins the race.
    store.join("5").await;
    h.await_connected().await;
    store.push_insert("5", msg("2", "2024-01-01T10:00:05Z", "5", "yo")).await;
    assert_eq!(ids(&h.next_view().await), vec!["2"]);

    // History then resolves, containing the same id=2 row.
    resolve
        .send(Ok(vec![
            msg("1", "2024-01-01T10:00:00Z", "5", "hi"),
            msg("2", "2024-01-01T10:00:05Z", "5", "yo"),
        ]))
        .unwrap();

    let view = h.next_view().await;
    assert_eq!(ids(&view), vec!["1", "2"]);
    assert_eq!(view.len(), 2, "duplicate delivery must not add a third entry");
}

#[tokio::test]
async fn union_of_both_feeds_each_exactly_once_sorted() {
    let store = FakeStore::new();
    store.stage_history(
        "3",
        vec![
            msg("c", "2024-01-01T10:00:20Z", "3", "third"),
            msg("a", "2024-01-01T10:00:00Z", "3", "first"),
        ],
    );
    let mut h = spawn_engine(store.clone());

    h.bind("3", "users").await;
    assert!(h.next_view().await.is_empty());
    assert_eq!(ids(&h.next_view().await), vec!["a", "c"]);

    store.join("3").await;
    h.await_connected().await;

    store.push_insert("3", msg("b", "2024-01-01T10:00:10Z", "3", "second")).await;
    assert_eq!(ids(&h.next_view().await), vec!["a", "b", "c"]);

    // A duplicate of "a" produces no view change; the next change we see
    // must already include "d".
    store.push_insert("3", msg("a", "2024-01-01T10:00:00Z", "3", "first")).await;
    store.push_insert("3", msg("d", "2024-01-01T10:00:30Z", "3", "fourth")).await;
    assert_eq!(ids(&h.next_view().await), vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn empty_and_whitespace_sends_never_reach_the_store() {
    let store = FakeStore::new();
    let mut h = spawn_engine(store.clone());

    h.bind("1", "users").await;
    let _ = h.next_view().await;
    store.join("1").await;
    h.await_connected().await;

    h.send("").await;
    assert!(!h.next_send_failed().await.is_empty());
    h.send("   ").await;
    assert!(!h.next_send_failed().await.is_empty());

    assert!(store.sent().is_empty(), "no network write may happen");
}

#[tokio::test]
async fn send_while_disconnected_is_rejected_locally() {
    let store = FakeStore::new();
    let mut h = spawn_engine(store.clone());

    h.bind("1", "users").await;
    let _ = h.next_view().await;
    // No join: the channel never confirmed.
    h.send("bonjour").await;

    let reason = h.next_send_failed().await;
    assert!(reason.contains("connecté"), "unexpected reason: {reason}");
    assert!(store.sent().is_empty());
}

#[tokio::test]
async fn connected_send_delegates_to_the_store() {
    let store = FakeStore::new();
    let mut h = spawn_engine(store.clone());

    h.bind("2", "claire").await;
    let _ = h.next_view().await;
    store.join("2").await;
    h.await_connected().await;

    h.send("tout va bien").await;
    wait_until(|| !store.sent().is_empty()).await;

    assert_eq!(
        store.sent(),
        vec![SentRow {
            room: "2".to_string(),
            username: "claire".to_string(),
            content: "tout va bien".to_string(),
        }]
    );
}

#[tokio::test]
async fn unauthenticated_send_surfaces_failure() {
    let store = FakeStore::new();
    store.set_authenticated(false);
    let mut h = spawn_engine(store.clone());

    h.bind("2", "users").await;
    let _ = h.next_view().await;
    store.join("2").await;
    h.await_connected().await;

    h.send("bonjour").await;
    let reason = h.next_send_failed().await;
    assert!(reason.contains("authenticated"), "unexpected reason: {reason}");
    assert!(store.sent().is_empty());
}

#[tokio::test]
async fn rebind_closes_old_subscription_before_opening_new() {
    let store = FakeStore::new();
    let mut h = spawn_engine(store.clone());

    h.bind("1", "users").await;
    let _ = h.next_view().await;
    store.join("1").await;
    h.await_connected().await;

    h.bind("2", "users").await;
    let _ = h.next_view().await;

    let subs = store.subscription_state();
    assert_eq!(subs.len(), 2);
    let (room_a, closed_a, _) = &subs[0];
    let (room_b, closed_b, open_when_b_created) = &subs[1];
    assert_eq!(room_a, "1");
    assert!(*closed_a, "old subscription must be closed");
    assert_eq!(room_b, "2");
    assert!(!*closed_b);
    assert!(
        open_when_b_created.is_empty(),
        "room 1 was still open when room 2's subscription was created: {open_when_b_created:?}"
    );
}

#[tokio::test]
async fn events_from_old_room_never_merge_after_rebind() {
    let store = FakeStore::new();
    let mut h = spawn_engine(store.clone());

    h.bind("1", "users").await;
    let _ = h.next_view().await;
    store.join("1").await;
    h.await_connected().await;

    h.bind("2", "users").await;
    let _ = h.next_view().await;

    // Stray echo on the dead room 1 channel, then real traffic on room 2.
    store.push_insert("1", msg("x", "2024-01-01T10:00:00Z", "1", "stray")).await;
    store.join("2").await;
    h.await_connected().await;
    store.push_insert("2", msg("y", "2024-01-01T10:00:01Z", "2", "fresh")).await;

    let view = h.next_view().await;
    assert_eq!(ids(&view), vec!["y"]);
}

#[tokio::test]
async fn late_history_for_an_unbound_room_is_discarded() {
    let store = FakeStore::new();
    let resolve = store.stage_history_pending("1");
    store.stage_history("2", vec![msg("b1", "2024-01-01T09:00:00Z", "2", "archive")]);
    let mut h = spawn_engine(store.clone());

    h.bind("1", "users").await;
    assert!(h.next_view().await.is_empty());

    h.bind("2", "users").await;
    assert!(h.next_view().await.is_empty());
    assert_eq!(ids(&h.next_view().await), vec!["b1"]);

    // Room 1's fetch finally resolves; it must not leak into room 2.
    let _ = resolve.send(Ok(vec![msg("a1", "2024-01-01T08:00:00Z", "1", "stale")]));

    store.join("2").await;
    h.await_connected().await;
    store.push_insert("2", msg("b2", "2024-01-01T10:00:00Z", "2", "live")).await;

    let view = h.next_view().await;
    assert_eq!(ids(&view), vec!["b1", "b2"]);
}

#[tokio::test]
async fn unbind_closes_the_subscription_and_rejects_sends() {
    let store = FakeStore::new();
    let mut h = spawn_engine(store.clone());

    h.bind("1", "users").await;
    let _ = h.next_view().await;
    store.join("1").await;
    h.await_connected().await;

    h.commands.send(ChatCommand::Unbind).await.unwrap();
    h.send("bonjour").await;

    let reason = h.next_send_failed().await;
    assert!(reason.contains("aucune zone"), "unexpected reason: {reason}");
    assert!(store.sent().is_empty());

    let subs = store.subscription_state();
    assert!(subs[0].1, "subscription must be closed on unbind");
}

#[tokio::test]
async fn history_failure_degrades_but_live_flow_continues() {
    let store = FakeStore::new();
    store.stage_history_error("4");
    let mut h = spawn_engine(store.clone());

    h.bind("4", "users").await;
    let _ = h.next_view().await;
    assert!(h.next_degraded().await.contains("backend down"));

    store.join("4").await;
    h.await_connected().await;
    store.push_insert("4", msg("1", "2024-01-01T10:00:00Z", "4", "still here")).await;
    assert_eq!(contents(&h.next_view().await), vec!["still here"]);
}

#[tokio::test]
async fn lost_channel_is_reported_but_does_not_drop_connected() {
    let store = FakeStore::new();
    let mut h = spawn_engine(store.clone());

    h.bind("6", "users").await;
    let _ = h.next_view().await;
    store.join("6").await;
    h.await_connected().await;

    store.push_lost("6").await;
    assert!(h.next_degraded().await.contains("socket dropped"));

    // The flag never reverts, so sends still pass the local gate.
    h.send("après la coupure").await;
    wait_until(|| !store.sent().is_empty()).await;
    assert_eq!(store.sent()[0].content, "après la coupure");
}
