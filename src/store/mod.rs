mod error;
mod realtime;
mod supabase;

pub use error::StoreError;
pub use supabase::{SupabaseStore, UserIdentity};

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::common::ChatMessage;

/// Events delivered on a room's live feed.
#[derive(Debug, Clone)]
pub enum SubscriptionEvent {
    /// The server acknowledged the channel join; live inserts follow.
    Joined,
    /// One newly inserted row.
    Insert(ChatMessage),
    /// The channel failed or closed. No reconnect is attempted; the feed
    /// ends here.
    Lost(StoreError),
}

/// A live insert feed for one room plus the handle that closes it.
#[derive(Debug)]
pub struct Subscription {
    pub events: mpsc::Receiver<SubscriptionEvent>,
    pub handle: SubscriptionHandle,
}

/// Closes the underlying channel task. `close` is idempotent and also runs
/// on drop, so a handle can never leak a live channel.
#[derive(Debug)]
pub struct SubscriptionHandle {
    task: Option<JoinHandle<()>>,
    closed: Arc<AtomicBool>,
}

impl SubscriptionHandle {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task), closed: Arc::new(AtomicBool::new(false)) }
    }

    pub fn close(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            if let Some(task) = self.task.take() {
                task.abort();
            }
        }
    }

    /// Shared view of the closed flag, observable after the handle is gone.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// The remote persistence + pubsub boundary.
///
/// One concrete implementation talks to the hosted backend; tests substitute
/// an in-memory store. Implementations are cheap to clone (shared inner
/// state) so the engine can run fetches and sends off its own task.
pub trait MessageStore: Clone + Send + Sync + 'static {
    /// All rows for `room`, ordered by creation time ascending.
    fn fetch_history(
        &self,
        room: &str,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, StoreError>> + Send;

    /// Open the live insert feed for `room`. Returns immediately; the join
    /// acknowledgement arrives later as [`SubscriptionEvent::Joined`].
    fn subscribe(&self, room: &str) -> Subscription;

    /// Insert one message row. Requires a resolved identity. The backend
    /// assigns id and timestamp, and the row is delivered back through the
    /// live feed; there is no local echo.
    fn send(
        &self,
        room: &str,
        username: &str,
        content: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
