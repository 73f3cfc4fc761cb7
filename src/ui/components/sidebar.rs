use eframe::egui;

use crate::common::zones::{self, RiskCategory};
use crate::ui::state::AppState;

/// Returns the zone id selected this frame, if the user changed rooms.
pub fn render(ui: &mut egui::Ui, state: &AppState) -> Option<String> {
    let mut selected = None;

    ui.heading("Zones");
    ui.separator();

    for zone in &zones::ALL {
        let active = state.active_zone.as_deref() == Some(zone.id);
        ui.horizontal(|ui| {
            ui.colored_label(risk_color(zone.risk), "●");
            if ui.selectable_label(active, zone.name).clicked() && !active {
                selected = Some(zone.id.to_string());
            }
        });
        ui.label(egui::RichText::new(zone.risk.label()).weak().small());
        ui.add_space(2.0);
    }

    selected
}

pub fn risk_color(risk: RiskCategory) -> egui::Color32 {
    match risk {
        RiskCategory::Seismic => egui::Color32::RED,
        RiskCategory::Flood => egui::Color32::from_rgb(0x3b, 0x82, 0xf6),
        RiskCategory::SeismicAndFlood => egui::Color32::ORANGE,
        RiskCategory::Unknown => egui::Color32::GRAY,
    }
}
