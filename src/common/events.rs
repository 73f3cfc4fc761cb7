use super::types::ChatMessage;

/// Events the sync engine sends up to the UI.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// The live subscription for the bound room acknowledged the join.
    Connected { room: String },
    /// The visible sequence changed; carries the full ordered view.
    MessagesChanged(Vec<ChatMessage>),
    /// A send was rejected, either locally or by the backend.
    SendFailed { reason: String },
    /// Part of the store is unreachable; live updates keep flowing with
    /// whatever data is available.
    StoreDegraded { detail: String },
}
