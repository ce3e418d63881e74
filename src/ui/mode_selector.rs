//! # Mode Selector Screen
//!
//! Initial screen letting the user choose between:
//!
//! ## Sketch Editor
//! Edit a sketch and have the build service verify it or upload it to the board.
//! The sketch is shared with other editors through a retained broker message.
//!
//! ## Sensor Monitor
//! Watch decoded sensor messages arriving on the configured topic filters.

use eframe::egui;
use egui::Color32;

use super::OperatingMode;

/// Mode selector UI component.
pub struct ModeSelector {
    panel_height: f32,
}

impl ModeSelector {
    pub fn new() -> Self {
        Self { panel_height: 320.0 }
    }

    /// Render the mode selector screen.
    /// Returns the selected mode if any button was clicked.
    pub fn render(&mut self, ctx: &egui::Context) -> Option<OperatingMode> {
        let mut selection = None;
        let button_size = egui::vec2(160.0, 32.0);
        let bottom_padding = 30.0;
        let min_button_gap = 20.0;

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(30.0);
                ui.heading(egui::RichText::new("ArduinoBot IDE").size(28.0));
                ui.add_space(10.0);
                ui.label(egui::RichText::new("Select Mode").size(18.0));
                ui.add_space(50.0);
            });

            ui.horizontal(|ui| {
                let spacing = 15.0;
                let panel_width = 320.0;
                let total_width = panel_width * 2.0 + spacing;
                let available_width = ui.available_width();

                let original_spacing = ui.spacing().item_spacing.x;
                ui.spacing_mut().item_spacing.x = spacing;

                let padding = ((available_width - total_width).max(0.0) / 2.0 - 20.0).max(0.0);
                ui.add_space(padding);

                let panels = [
                    (
                        "Sketch Editor",
                        "Edit a sketch and let the build server verify it or upload it to the board. Changes are shared with every other editor that has the same sketch open.",
                        "Open editor",
                        OperatingMode::SketchEditor,
                    ),
                    (
                        "Sensor Monitor",
                        "Follow decoded sensor messages as they arrive from the broker. The topics to watch are set in the monitor section of config.toml.",
                        "Start monitor",
                        OperatingMode::SensorMonitor,
                    ),
                ];

                for (title, description, button_label, mode) in panels {
                    ui.group(|ui| {
                        ui.set_width(panel_width);
                        ui.set_min_height(self.panel_height);
                        ui.vertical_centered(|ui| {
                            let start_y = ui.cursor().min.y;
                            ui.add_space(20.0);
                            ui.heading(egui::RichText::new(title).size(22.0).color(Color32::WHITE));
                            ui.add_space(10.0);
                            ui.label(egui::RichText::new(description).size(16.0));
                            let used_height = ui.cursor().min.y - start_y;
                            let remaining = self.panel_height - used_height - button_size.y - bottom_padding;
                            ui.add_space(remaining.max(min_button_gap));
                            let button = egui::Button::new(egui::RichText::new(button_label).size(15.0).color(Color32::WHITE)).min_size(button_size);
                            if ui.add(button).clicked() {
                                selection = Some(mode);
                            }
                            ui.add_space(bottom_padding);
                        });
                    });
                }

                ui.add_space(padding);
                ui.spacing_mut().item_spacing.x = original_spacing;
            });
        });

        selection
    }
}
