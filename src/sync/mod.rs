mod engine;
mod messages;

pub use engine::SyncEngine;
