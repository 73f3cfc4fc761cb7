mod commands;
mod events;
mod types;
pub mod zones;

pub use commands::ChatCommand;
pub use events::ChatEvent;
pub use types::ChatMessage;
