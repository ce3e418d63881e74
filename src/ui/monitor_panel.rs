//! # Monitor Screen
//!
//! Table of sensor readings, newest first, with a topic filter and a pause toggle.

use eframe::egui;
use egui::Color32;
use egui_extras::{Column, TableBuilder};

use crate::session::monitor::SensorReading;
use crate::ui::{AppState, editor_panel};

/// Readings whose topic contains `filter`, case-insensitive, newest first.
pub fn filtered<'a>(readings: impl DoubleEndedIterator<Item = &'a SensorReading>, filter: &str) -> Vec<&'a SensorReading> {
    let filter = filter.trim().to_lowercase();
    readings.rev().filter(|r| filter.is_empty() || r.topic.to_lowercase().contains(&filter)).collect()
}

pub fn render(ctx: &egui::Context, state: &mut AppState) {
    egui::TopBottomPanel::top("monitor_toolbar").show(ctx, |ui| {
        ui.add_space(6.0);
        ui.horizontal(|ui| {
            ui.heading("Sensor Monitor");
            ui.separator();
            editor_panel::connection_controls(ui, state);
            ui.separator();
            ui.label("Topic filter:");
            ui.text_edit_singleline(&mut state.topic_filter);
            ui.checkbox(&mut state.paused, "Pause");
            if ui.button("Clear").clicked() {
                state.readings.clear();
            }
            ui.label(format!("{} / {}", state.readings.len(), state.history_limit));
        });
        ui.add_space(6.0);
    });

    egui::CentralPanel::default().show(ctx, |ui| {
        state.alerts.render(ui);

        let rows = filtered(state.readings.iter(), &state.topic_filter);
        if rows.is_empty() {
            ui.centered_and_justified(|ui| {
                ui.label("No sensor messages yet.");
            });
            return;
        }

        let row_height = ui.text_style_height(&egui::TextStyle::Monospace) * 1.3;
        TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .vscroll(true)
            .cell_layout(egui::Layout::left_to_right(egui::Align::Min))
            .column(Column::initial(80.0).at_least(60.0)) // Time
            .column(Column::initial(220.0).at_least(80.0)) // Topic
            .column(Column::remainder()) // Body
            .header(row_height, |mut header| {
                header.col(|ui| {
                    ui.strong("Time");
                });
                header.col(|ui| {
                    ui.strong("Topic");
                });
                header.col(|ui| {
                    ui.strong("Message");
                });
            })
            .body(|mut body| {
                for reading in rows {
                    let lines = reading.body.lines().count().max(1) as f32;
                    body.row(row_height * lines, |mut row| {
                        row.col(|ui| {
                            ui.monospace(reading.received_at.format("%H:%M:%S").to_string());
                        });
                        row.col(|ui| {
                            ui.colored_label(Color32::LIGHT_BLUE, &reading.topic);
                        });
                        row.col(|ui| {
                            ui.monospace(&reading.body);
                        });
                    });
                }
            });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn reading(topic: &str) -> SensorReading {
        SensorReading {
            topic: topic.to_string(),
            received_at: Local::now(),
            body: String::new(),
        }
    }

    #[test]
    fn test_filtered_newest_first() {
        let readings = vec![reading("sensors/kitchen"), reading("sensors/Garage"), reading("sensors/kitchen/co2")];
        let topics: Vec<_> = filtered(readings.iter(), "KITCHEN").iter().map(|r| r.topic.as_str()).collect();
        assert_eq!(topics, vec!["sensors/kitchen/co2", "sensors/kitchen"]);
        assert_eq!(filtered(readings.iter(), "  ").len(), 3);
    }
}
