use chrono::DateTime;
use eframe::egui;

use crate::common::ChatMessage;

pub fn render(ui: &mut egui::Ui, messages: &[ChatMessage]) {
    egui::ScrollArea::vertical()
        .stick_to_bottom(true)
        .show(ui, |ui| {
            if messages.is_empty() {
                ui.label(egui::RichText::new("Aucun message dans cette zone").weak());
                return;
            }
            for message in messages {
                ui.horizontal_wrapped(|ui| {
                    ui.label(egui::RichText::new(message.username.as_str()).strong());
                    ui.label(egui::RichText::new(format_time(&message.created_at)).weak());
                });
                ui.label(&message.content);
                ui.add_space(4.0);
            }
        });
}

fn format_time(created_at: &str) -> String {
    // Timestamps stay raw strings everywhere else; parsing is display-only.
    DateTime::parse_from_rfc3339(created_at)
        .map(|ts| ts.format("%H:%M:%S").to_string())
        .unwrap_or_else(|_| created_at.to_string())
}
