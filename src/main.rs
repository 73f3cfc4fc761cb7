mod common;
mod config;
mod store;
mod sync;
mod ui;

use tokio::sync::mpsc;

use store::SupabaseStore;
use sync::SyncEngine;
use ui::ChatApp;

#[tokio::main]
async fn main() -> Result<(), eframe::Error> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match config::load() {
        Ok(config) => config,
        Err(err) => {
            log::error!("Configuration error: {err}");
            std::process::exit(2);
        }
    };

    let store = match SupabaseStore::new(
        &config.supabase_url,
        &config.anon_key,
        config.access_token.clone(),
    ) {
        Ok(store) => store,
        Err(err) => {
            log::error!("Failed to build backend client: {err}");
            std::process::exit(2);
        }
    };

    // UI -> engine
    let (command_tx, command_rx) = mpsc::channel(100);
    // engine -> UI
    let (event_tx, event_rx) = mpsc::channel(100);

    tokio::spawn(SyncEngine::new(store, command_rx, event_tx).run());

    let options = eframe::NativeOptions::default();
    let mut event_rx = Some(event_rx);
    let username = config.username.clone();
    let initial_zone = Some(config.zone.clone());

    eframe::run_native(
        "Lyon Zone Chat",
        options,
        Box::new(move |cc| {
            let event_receiver = event_rx
                .take()
                .expect("ChatApp should only be initialized once");

            log::info!(
                "Client started (zone {}, user {})",
                config.zone,
                config.username
            );

            Ok(Box::new(ChatApp::new(
                cc,
                username.clone(),
                initial_zone.clone(),
                command_tx.clone(),
                event_receiver,
            )))
        }),
    )
}
