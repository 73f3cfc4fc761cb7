#[cfg(test)]
#[path = "state_test.rs"]
mod state_test;

use crate::common::{ChatEvent, ChatMessage};

/// Local state of the UI. The engine owns the canonical message sequence;
/// this just mirrors the latest events into something the panels can draw.
pub struct AppState {
    pub messages: Vec<ChatMessage>,
    pub input_text: String,
    pub active_zone: Option<String>,
    pub connected: bool,
    pub last_notice: Option<String>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            input_text: String::new(),
            active_zone: None,
            connected: false,
            last_notice: None,
        }
    }

    /// Switch zones locally. The caller is responsible for also sending the
    /// bind command to the engine.
    pub fn select_zone(&mut self, zone: String) {
        self.active_zone = Some(zone);
        self.connected = false;
        self.messages.clear();
        self.last_notice = None;
    }

    pub fn apply_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::Connected { room } => {
                if self.active_zone.as_deref() == Some(room.as_str()) {
                    self.connected = true;
                }
            }
            ChatEvent::MessagesChanged(view) => {
                self.messages = view;
            }
            ChatEvent::SendFailed { reason } => {
                self.last_notice = Some(format!("Envoi impossible : {reason}"));
            }
            ChatEvent::StoreDegraded { detail } => {
                self.last_notice = Some(format!("Connexion dégradée : {detail}"));
            }
        }
    }
}
