/// Commands the UI sends down to the sync engine.
#[derive(Debug, Clone)]
pub enum ChatCommand {
    /// Bind to a zone room: tear down any previous binding, then fetch
    /// history and open the live subscription for the new room.
    Bind { room: String, username: String },
    /// Validate and forward one outgoing message for the bound room.
    Send { content: String },
    /// Drop the current binding and close its subscription.
    Unbind,
}
