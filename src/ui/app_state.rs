//! # Application State Management
//!
//! This module implements the central `AppState` struct which holds all UI state
//! and implements the `eframe::App` trait.
//!
//! ## Responsibilities
//!
//! - Processes incoming updates from the session task via `ui_refresh_rx`
//! - Sends user commands to the session task via `ui_command_tx`
//! - Shows the mode selector, then delegates to the editor or monitor panel
//! - Persists user settings (last sketch directory) across application sessions

use eframe::egui;
use embassy_time::Instant;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::alerts::AlertStack;
use super::{Alert, AlertKind, OperatingMode, UICommand, UIRefreshState, editor_panel, mode_selector, monitor_panel};
use crate::correlation::Command;
use crate::session::monitor::SensorReading;

/// Central application state.
pub struct AppState {
    /// Receiver for UI refresh messages from the session task.
    pub ui_refresh_rx: crate::UIRefreshQueueReceiver,
    /// Sender for commands from the UI to the session task.
    pub ui_command_tx: crate::UICommandQueueSender,

    pub mode_selector: mode_selector::ModeSelector,
    /// Selected mode, `None` while the mode selector is shown.
    pub mode: Option<OperatingMode>,
    pub alerts: AlertStack,

    // Broker state
    pub connected: bool,
    /// Hosts offered in the server selector.
    pub servers: Vec<String>,
    /// Selected host, the first entry of `servers` at startup.
    pub server: String,
    /// A verify/upload job is in flight.
    pub busy: bool,

    // Editor state
    pub sketch_name: String,
    pub source: String,
    /// Last directory used by the open/save sketch dialogs.
    pub last_sketch_dir: Option<String>,

    // Monitor state
    /// Newest reading at the back.
    pub readings: VecDeque<SensorReading>,
    pub history_limit: usize,
    /// Case-insensitive topic filter for the monitor table.
    pub topic_filter: String,
    pub paused: bool,
}

/// Settings persisted across application sessions.
#[derive(Default, Serialize, Deserialize)]
struct PersistedSettings {
    last_sketch_dir: Option<String>,
}

impl AppState {
    /// Create a new AppState, loading persisted settings if available.
    pub fn new(
        rx: crate::UIRefreshQueueReceiver,
        tx: crate::UICommandQueueSender,
        servers: Vec<String>,
        history_limit: usize,
        storage: Option<&dyn eframe::Storage>,
    ) -> Self {
        let persisted: PersistedSettings = storage.and_then(|s| eframe::get_value(s, "app_settings")).unwrap_or_default();

        Self {
            ui_refresh_rx: rx,
            ui_command_tx: tx,
            mode_selector: mode_selector::ModeSelector::new(),
            mode: None,
            alerts: AlertStack::default(),
            connected: false,
            server: servers.first().cloned().unwrap_or_default(),
            servers,
            busy: false,
            sketch_name: String::new(),
            source: String::new(),
            last_sketch_dir: persisted.last_sketch_dir,
            readings: VecDeque::new(),
            history_limit: history_limit.max(1),
            topic_filter: String::new(),
            paused: false,
        }
    }

    /// Verify/Upload are only possible on a live connection with no job running.
    pub fn can_submit(&self) -> bool {
        self.connected && !self.busy
    }

    /// Ask the session task to run `command` on the current editor content.
    pub fn request(&mut self, command: Command) {
        if !self.can_submit() {
            return;
        }
        let _ = self.ui_command_tx.try_send(UICommand::Submit {
            command,
            source: self.source.clone(),
        });
    }

    /// Switch the session to another broker. Selecting the current one does nothing.
    pub fn select_server(&mut self, host: String) {
        if host == self.server {
            return;
        }
        log::info!("Server changed to {}", host);
        self.server = host.clone();
        self.connected = false;
        let _ = self.ui_command_tx.try_send(UICommand::SwitchBroker(host));
    }

    /// Tell the session task about an edit so sketch sync compares against it.
    pub fn source_edited(&mut self) {
        let _ = self.ui_command_tx.try_send(UICommand::SourceEdited(self.source.clone()));
    }

    /// Show an alert raised by the UI itself (file dialogs etc.).
    pub fn local_alert(&mut self, kind: AlertKind, title: &str, message: String) {
        self.alerts.push(Alert::new(kind, title, message, false), Instant::now());
    }

    /// Apply one update from the session task.
    pub fn apply(&mut self, msg: UIRefreshState) {
        match msg {
            UIRefreshState::Alert(alert) => self.alerts.push(alert, Instant::now()),
            UIRefreshState::ClearAlerts => self.alerts.clear(),
            UIRefreshState::ConnectionChanged(connected) => self.connected = connected,
            UIRefreshState::BrokerSelected(host) => self.server = host,
            UIRefreshState::Busy(busy) => self.busy = busy,
            UIRefreshState::SketchOpened(name) => self.sketch_name = name,
            UIRefreshState::SourceReplaced(source) => self.source = source,
            UIRefreshState::SensorReading(reading) => {
                if self.paused {
                    return;
                }
                if self.readings.len() >= self.history_limit {
                    self.readings.pop_front();
                }
                self.readings.push_back(reading);
            }
        }
    }

    /// Open a native file picker and load a sketch into the editor.
    pub fn open_sketch_file(&mut self) {
        let mut dialog = rfd::FileDialog::new().add_filter("Sketch", &["ino", "c", "cpp", "h"]);
        if let Some(dir) = &self.last_sketch_dir {
            dialog = dialog.set_directory(dir);
        }
        let Some(file) = dialog.pick_file() else {
            return;
        };
        if let Some(parent) = file.parent() {
            self.last_sketch_dir = Some(parent.to_string_lossy().to_string());
        }
        match std::fs::read_to_string(&file) {
            Ok(source) => {
                log::info!("Loaded sketch from {}", file.display());
                self.source = source;
                self.source_edited();
            }
            Err(e) => {
                log::error!("Failed to read {}: {}", file.display(), e);
                self.local_alert(AlertKind::Danger, "Open failed!", format!("{}: {}", file.display(), e));
            }
        }
    }

    /// Save the editor content to a local file.
    pub fn save_sketch_file(&mut self) {
        let mut dialog = rfd::FileDialog::new()
            .add_filter("Sketch", &["ino"])
            .set_file_name(format!("{}.ino", self.sketch_name));
        if let Some(dir) = &self.last_sketch_dir {
            dialog = dialog.set_directory(dir);
        }
        let Some(file) = dialog.save_file() else {
            return;
        };
        if let Some(parent) = file.parent() {
            self.last_sketch_dir = Some(parent.to_string_lossy().to_string());
        }
        if let Err(e) = std::fs::write(&file, &self.source) {
            log::error!("Failed to write {}: {}", file.display(), e);
            self.local_alert(AlertKind::Danger, "Save failed!", format!("{}: {}", file.display(), e));
        }
    }
}

impl eframe::App for AppState {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        let settings = PersistedSettings {
            last_sketch_dir: self.last_sketch_dir.clone(),
        };
        eframe::set_value(storage, "app_settings", &settings);
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let Some(mode) = self.mode else {
            if let Some(mode) = self.mode_selector.render(ctx) {
                self.mode = Some(mode);
                let _ = self.ui_command_tx.try_send(UICommand::StartMode(mode));
            }
            return;
        };

        // Repaint periodically so background updates are visible without input
        ctx.request_repaint_after(std::time::Duration::from_millis(50));

        while let Ok(msg) = self.ui_refresh_rx.try_receive() {
            self.apply(msg);
        }
        self.alerts.expire(Instant::now());

        match mode {
            OperatingMode::SketchEditor => editor_panel::render(ctx, self),
            OperatingMode::SensorMonitor => monitor_panel::render(ctx, self),
        }
    }
}
