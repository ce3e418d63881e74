//! Alert banner stack rendered at the top of both screens.

use eframe::egui;
use egui::Color32;
use embassy_time::{Duration, Instant};

use super::{Alert, AlertKind};

/// How long a fading alert stays visible.
pub const ALERT_FADE_DURATION: Duration = Duration::from_millis(2000);

struct ShownAlert {
    alert: Alert,
    /// Set for fading alerts
    expires_at: Option<Instant>,
}

/// Visible alerts in arrival order.
#[derive(Default)]
pub struct AlertStack {
    shown: Vec<ShownAlert>,
}

impl AlertStack {
    pub fn push(&mut self, alert: Alert, now: Instant) {
        let expires_at = alert.fading.then(|| now + ALERT_FADE_DURATION);
        self.shown.push(ShownAlert { alert, expires_at });
    }

    pub fn clear(&mut self) {
        self.shown.clear();
    }

    /// Drop fading alerts whose time is up.
    pub fn expire(&mut self, now: Instant) {
        self.shown.retain(|s| s.expires_at.is_none_or(|t| t > now));
    }

    pub fn len(&self) -> usize {
        self.shown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }

    /// Render every alert as a coloured frame with a close button.
    pub fn render(&mut self, ui: &mut egui::Ui) {
        let mut closed = None;
        for (index, shown) in self.shown.iter().enumerate() {
            let (fill, text) = colors_for(shown.alert.kind);
            egui::Frame::new().fill(fill).corner_radius(4.0).inner_margin(8.0).show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.horizontal(|ui| {
                    if !shown.alert.title.is_empty() {
                        ui.label(egui::RichText::new(&shown.alert.title).strong().color(text));
                    }
                    ui.label(egui::RichText::new(&shown.alert.message).color(text));
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("×").clicked() {
                            closed = Some(index);
                        }
                    });
                });
            });
            ui.add_space(4.0);
        }
        if let Some(index) = closed {
            self.shown.remove(index);
        }
    }
}

/// Background and text colour per alert kind.
fn colors_for(kind: AlertKind) -> (Color32, Color32) {
    match kind {
        AlertKind::Success => (Color32::from_rgb(212, 237, 218), Color32::from_rgb(21, 87, 36)),
        AlertKind::Info => (Color32::from_rgb(209, 236, 241), Color32::from_rgb(12, 84, 96)),
        AlertKind::Warning => (Color32::from_rgb(255, 243, 205), Color32::from_rgb(133, 100, 4)),
        AlertKind::Danger => (Color32::from_rgb(248, 215, 218), Color32::from_rgb(114, 28, 36)),
    }
}
