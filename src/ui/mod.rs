// UI module for the ArduinoBot IDE
//
// This module organizes the UI into separate components:
// - `mode_selector`: Initial mode selection screen
// - `editor_panel`: Sketch editor with Verify/Upload controls
// - `monitor_panel`: Sensor message stream
// - `alerts`: Alert banner stack shared by both modes
// - `app_state`: Application state management and main update loop

pub mod alerts;
pub mod app_state;
pub mod editor_panel;
pub mod mode_selector;
pub mod monitor_panel;

use crate::correlation::Command;
use crate::session::monitor::SensorReading;

pub use app_state::AppState;

/// Which screen the application runs after the mode selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    SketchEditor,
    SensorMonitor,
}

/// Bootstrap alert colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Success,
    Info,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    /// Close automatically after a short while
    pub fading: bool,
}

impl Alert {
    pub fn new(kind: AlertKind, title: impl Into<String>, message: impl Into<String>, fading: bool) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            fading,
        }
    }
}

#[derive(Debug)]
pub enum UIRefreshState {
    Alert(Alert),
    ClearAlerts,
    /// Broker connection up or down
    ConnectionChanged(bool),
    /// Host the session is now connected or connecting to
    BrokerSelected(String),
    /// A job is in flight
    Busy(bool),
    /// Name of the sketch the session works on
    SketchOpened(String),
    /// Another client published a newer copy of the open sketch
    SourceReplaced(String),
    SensorReading(SensorReading),
}

#[derive(Debug)]
pub enum UICommand {
    StartMode(OperatingMode),
    Submit { command: Command, source: String },
    SourceEdited(String),
    /// Drop the current broker connection and connect to this host
    SwitchBroker(String),
}
