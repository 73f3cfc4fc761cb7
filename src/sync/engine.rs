#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::common::{ChatCommand, ChatEvent, ChatMessage};
use crate::store::{MessageStore, StoreError, SubscriptionEvent, SubscriptionHandle};

use super::messages::MessageSet;

const INGEST_BUFFER: usize = 256;

/// Items arriving on the engine's single inbound queue.
///
/// Everything that can mutate a binding flows through here, tagged with the
/// generation of the binding it belongs to. The engine task is the only
/// writer of its state, so history results and live inserts can never race.
#[derive(Debug)]
enum Ingest {
    History { generation: u64, result: Result<Vec<ChatMessage>, StoreError> },
    Live { generation: u64, event: SubscriptionEvent },
    SendOutcome { generation: u64, result: Result<(), StoreError> },
}

struct RoomBinding {
    room: String,
    username: String,
    generation: u64,
    connected: bool,
    messages: MessageSet,
    subscription: SubscriptionHandle,
    forwarder: JoinHandle<()>,
    history: JoinHandle<()>,
}

/// Merges history and live inserts for the bound room into one ordered,
/// de-duplicated visible sequence, and owns the room's subscription
/// lifecycle. Exactly one subscription is open at any time.
///
/// `connected` flips once per binding when the channel join is acknowledged
/// and never reverts: a lost channel is reported but not reopened.
pub struct SyncEngine<S> {
    store: S,
    command_rx: mpsc::Receiver<ChatCommand>,
    event_tx: mpsc::Sender<ChatEvent>,
    ingest_tx: mpsc::Sender<Ingest>,
    ingest_rx: mpsc::Receiver<Ingest>,
    binding: Option<RoomBinding>,
    generation: u64,
}

impl<S: MessageStore> SyncEngine<S> {
    pub fn new(
        store: S,
        command_rx: mpsc::Receiver<ChatCommand>,
        event_tx: mpsc::Sender<ChatEvent>,
    ) -> Self {
        let (ingest_tx, ingest_rx) = mpsc::channel(INGEST_BUFFER);
        Self {
            store,
            command_rx,
            event_tx,
            ingest_tx,
            ingest_rx,
            binding: None,
            generation: 0,
        }
    }

    pub async fn run(mut self) {
        log::info!("Sync engine started");
        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(ingest) = self.ingest_rx.recv() => {
                    if let Some(event) = self.apply_ingest(ingest) {
                        self.emit(event).await;
                    }
                }
            }
        }
        self.unbind();
        log::info!("Sync engine stopped");
    }

    async fn handle_command(&mut self, command: ChatCommand) {
        match command {
            ChatCommand::Bind { room, username } => self.bind(room, username).await,
            ChatCommand::Send { content } => self.send(content).await,
            ChatCommand::Unbind => self.unbind(),
        }
    }

    async fn bind(&mut self, room: String, username: String) {
        // The old subscription must be gone before the new one opens, or a
        // channel scoped to the wrong room would keep feeding us.
        self.unbind();

        self.generation += 1;
        let generation = self.generation;
        log::info!("Binding room {room} (generation {generation})");

        // History fetch and subscription start concurrently; either side
        // may produce the first ingest item.
        let subscription = self.store.subscribe(&room);
        let mut live_events = subscription.events;
        let handle = subscription.handle;

        let forwarder = {
            let ingest = self.ingest_tx.clone();
            tokio::spawn(async move {
                while let Some(event) = live_events.recv().await {
                    if ingest.send(Ingest::Live { generation, event }).await.is_err() {
                        break;
                    }
                }
            })
        };

        let history = {
            let store = self.store.clone();
            let ingest = self.ingest_tx.clone();
            let room = room.clone();
            tokio::spawn(async move {
                let result = store.fetch_history(&room).await;
                let _ = ingest.send(Ingest::History { generation, result }).await;
            })
        };

        self.binding = Some(RoomBinding {
            room,
            username,
            generation,
            connected: false,
            messages: MessageSet::new(),
            subscription: handle,
            forwarder,
            history,
        });

        // Fresh room, fresh view.
        self.emit(ChatEvent::MessagesChanged(Vec::new())).await;
    }

    fn unbind(&mut self) {
        if let Some(mut binding) = self.binding.take() {
            log::info!("Unbinding room {}", binding.room);
            binding.subscription.close();
            binding.forwarder.abort();
            binding.history.abort();
        }
    }

    async fn send(&mut self, content: String) {
        if content.trim().is_empty() {
            self.emit(ChatEvent::SendFailed { reason: "message vide".to_string() }).await;
            return;
        }
        let Some(binding) = self.binding.as_ref() else {
            self.emit(ChatEvent::SendFailed { reason: "aucune zone active".to_string() }).await;
            return;
        };
        if !binding.connected {
            self.emit(ChatEvent::SendFailed { reason: "canal non connecté".to_string() }).await;
            return;
        }

        // Delegate off-task; the outcome comes back through the ingest
        // queue. The message itself only appears via the live echo.
        let generation = binding.generation;
        let store = self.store.clone();
        let room = binding.room.clone();
        let username = binding.username.clone();
        let ingest = self.ingest_tx.clone();
        tokio::spawn(async move {
            let result = store.send(&room, &username, &content).await;
            let _ = ingest.send(Ingest::SendOutcome { generation, result }).await;
        });
    }

    /// Apply one ingest item to the current binding. Items tagged with a
    /// stale generation (late history for an unbound room, echoes from a
    /// closed channel) are discarded here.
    fn apply_ingest(&mut self, ingest: Ingest) -> Option<ChatEvent> {
        let generation = match &ingest {
            Ingest::History { generation, .. }
            | Ingest::Live { generation, .. }
            | Ingest::SendOutcome { generation, .. } => *generation,
        };

        let binding = self.binding.as_mut()?;
        if binding.generation != generation {
            log::debug!(
                "Discarding stale ingest item (generation {generation}, bound {})",
                binding.generation
            );
            return None;
        }

        match ingest {
            Ingest::History { result: Ok(rows), .. } => {
                let mut changed = false;
                for row in rows {
                    changed |= binding.messages.insert(row);
                }
                changed.then(|| ChatEvent::MessagesChanged(binding.messages.ordered()))
            }
            Ingest::History { result: Err(err), .. } => {
                // Live inserts keep flowing; the view just starts shallow.
                log::warn!("History fetch failed for room {}: {err}", binding.room);
                Some(ChatEvent::StoreDegraded { detail: err.to_string() })
            }
            Ingest::Live { event: SubscriptionEvent::Joined, .. } => {
                if binding.connected {
                    return None;
                }
                binding.connected = true;
                log::info!("Live channel joined for room {}", binding.room);
                Some(ChatEvent::Connected { room: binding.room.clone() })
            }
            Ingest::Live { event: SubscriptionEvent::Insert(message), .. } => {
                if message.room != binding.room {
                    log::warn!(
                        "Dropping insert for room {} while bound to {}",
                        message.room,
                        binding.room
                    );
                    return None;
                }
                binding
                    .messages
                    .insert(message)
                    .then(|| ChatEvent::MessagesChanged(binding.messages.ordered()))
            }
            Ingest::Live { event: SubscriptionEvent::Lost(err), .. } => {
                // No reconnect is modeled; the connected flag stays as-is.
                log::warn!("Live channel lost for room {}: {err}", binding.room);
                Some(ChatEvent::StoreDegraded { detail: err.to_string() })
            }
            Ingest::SendOutcome { result: Err(err), .. } => {
                log::warn!("Send failed for room {}: {err}", binding.room);
                Some(ChatEvent::SendFailed { reason: err.to_string() })
            }
            Ingest::SendOutcome { result: Ok(()), .. } => None,
        }
    }

    async fn emit(&self, event: ChatEvent) {
        if self.event_tx.send(event).await.is_err() {
            log::warn!("UI event receiver dropped");
        }
    }
}
