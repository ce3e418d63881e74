//! # Editor Screen
//!
//! Top bar with the sketch name, the server selector, connection state and the
//! Verify/Upload/Open/Save buttons, the alert stack below it, and the code editor filling the rest.
//! F5 verifies and F6 uploads, like the toolbar buttons.

use eframe::egui;
use egui::Color32;

use crate::correlation::Command;
use crate::ui::AppState;

/// Server selector and connection indicator, shared by both screens.
pub fn connection_controls(ui: &mut egui::Ui, state: &mut AppState) {
    ui.label("Server:");
    let mut selected = state.server.clone();
    egui::ComboBox::from_id_salt("server_selector").selected_text(&selected).show_ui(ui, |ui| {
        for host in &state.servers {
            ui.selectable_value(&mut selected, host.clone(), host);
        }
    });
    if selected != state.server {
        state.select_server(selected);
    }

    let (status, color) = if state.connected {
        ("● Connected", Color32::LIGHT_GREEN)
    } else {
        ("● Disconnected", Color32::RED)
    };
    ui.label(egui::RichText::new(status).color(color));
}

pub fn render(ctx: &egui::Context, state: &mut AppState) {
    let (verify_key, upload_key) = ctx.input(|i| (i.key_pressed(egui::Key::F5), i.key_pressed(egui::Key::F6)));
    if verify_key {
        state.request(Command::Verify);
    } else if upload_key {
        state.request(Command::Upload);
    }

    egui::TopBottomPanel::top("editor_toolbar").show(ctx, |ui| {
        ui.add_space(6.0);
        ui.horizontal(|ui| {
            ui.heading(format!("{}.ino", state.sketch_name));
            ui.separator();
            connection_controls(ui, state);

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let enabled = state.can_submit();
                if ui.add_enabled(enabled, egui::Button::new("Upload (F6)")).clicked() {
                    state.request(Command::Upload);
                }
                if ui.add_enabled(enabled, egui::Button::new("Verify (F5)")).clicked() {
                    state.request(Command::Verify);
                }
                ui.separator();
                if ui.button("Save…").clicked() {
                    state.save_sketch_file();
                }
                if ui.button("Open…").clicked() {
                    state.open_sketch_file();
                }
                if state.busy {
                    ui.spinner();
                }
            });
        });
        ui.add_space(6.0);
    });

    egui::CentralPanel::default().show(ctx, |ui| {
        state.alerts.render(ui);

        egui::ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
            let response = ui.add_sized(
                ui.available_size(),
                egui::TextEdit::multiline(&mut state.source)
                    .code_editor()
                    .desired_width(f32::INFINITY)
                    .desired_rows(30)
                    .lock_focus(true),
            );
            if response.changed() {
                state.source_edited();
            }
        });
    });

    if state.busy {
        ctx.set_cursor_icon(egui::CursorIcon::Progress);
    }
}
