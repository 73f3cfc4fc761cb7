use eframe::egui;
use tokio::sync::mpsc;

use crate::common::{ChatCommand, ChatEvent, zones};

use super::components::{chat_area, input_bar, sidebar};
use super::state::AppState;

pub struct ChatApp {
    state: AppState,
    username: String,
    command_sender: mpsc::Sender<ChatCommand>,
    event_receiver: mpsc::Receiver<ChatEvent>,
}

impl ChatApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        username: String,
        initial_zone: Option<String>,
        command_sender: mpsc::Sender<ChatCommand>,
        event_receiver: mpsc::Receiver<ChatEvent>,
    ) -> Self {
        let mut app = Self {
            state: AppState::new(),
            username,
            command_sender,
            event_receiver,
        };
        if let Some(zone) = initial_zone {
            app.bind_zone(zone);
        }
        app
    }

    fn handle_engine_events(&mut self) {
        while let Ok(event) = self.event_receiver.try_recv() {
            self.state.apply_event(event);
        }
    }

    fn bind_zone(&mut self, zone: String) {
        self.state.select_zone(zone.clone());
        let command = ChatCommand::Bind { room: zone, username: self.username.clone() };
        if let Err(err) = self.command_sender.try_send(command) {
            log::warn!("Failed to send bind command to engine: {err}");
        }
    }

    fn send_message(&mut self, content: String) {
        if let Err(err) = self.command_sender.try_send(ChatCommand::Send { content }) {
            log::warn!("Failed to send chat command to engine: {err}");
        }
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_engine_events();

        egui::SidePanel::left("zone_sidebar")
            .resizable(true)
            .default_width(200.0)
            .show(ctx, |ui| {
                if let Some(zone) = sidebar::render(ui, &self.state) {
                    self.bind_zone(zone);
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            match self.state.active_zone.clone() {
                Some(zone_id) => {
                    let zone = zones::lookup(&zone_id);
                    ui.horizontal(|ui| {
                        ui.heading(zone.name.as_str());
                        ui.colored_label(sidebar::risk_color(zone.risk), zone.risk.label());
                        if self.state.connected {
                            ui.colored_label(egui::Color32::GREEN, "● en ligne");
                        } else {
                            ui.colored_label(egui::Color32::GRAY, "○ hors ligne");
                        }
                    });
                }
                None => {
                    ui.heading("Chat de zone");
                }
            }
            ui.separator();

            if let Some(notice) = self.state.last_notice.clone() {
                ui.colored_label(egui::Color32::YELLOW, notice);
                ui.separator();
            }

            chat_area::render(ui, &self.state.messages);

            ui.separator();
            if let Some(content) =
                input_bar::render(ui, &mut self.state.input_text, self.state.connected)
            {
                self.send_message(content);
            }
        });

        // Engine events arrive between frames; keep polling.
        ctx.request_repaint();
    }
}
