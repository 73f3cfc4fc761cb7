use eframe::egui;

/// Returns the submitted message, if any. Input stays disabled until the
/// live channel for the zone is connected.
pub fn render(ui: &mut egui::Ui, input_text: &mut String, connected: bool) -> Option<String> {
    let mut submitted = None;

    ui.horizontal(|ui| {
        let edit = ui.add_enabled(
            connected,
            egui::TextEdit::singleline(input_text).hint_text("Votre message..."),
        );
        let send_clicked = ui.add_enabled(connected, egui::Button::new("Envoyer")).clicked();
        let enter_pressed =
            edit.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));

        if (send_clicked || enter_pressed) && !input_text.trim().is_empty() {
            submitted = Some(input_text.trim().to_string());
            input_text.clear();
        }
    });

    if !connected {
        ui.label(egui::RichText::new("Connexion au salon en cours...").weak());
    }

    submitted
}
