//! Sketch editor session: connection state, busy state and the correlation client.

use super::Session;
use crate::UIRefreshQueueSender;
use crate::bridge::{BrokerEvent, Transport};
use crate::correlation::{Command, CorrelationClient, Outcome};
use crate::ui::{Alert, AlertKind, UICommand, UIRefreshState};

pub struct EditorSession<T: Transport> {
    client: CorrelationClient<T>,
    connected: bool,
    busy: bool,
    ui_refresh_tx: UIRefreshQueueSender,
}

impl<T: Transport> EditorSession<T> {
    pub fn new(transport: T, sketch: &str, ui_refresh_tx: UIRefreshQueueSender) -> Self {
        let session = Self {
            client: CorrelationClient::new(transport, sketch),
            connected: false,
            busy: false,
            ui_refresh_tx,
        };
        session.notify(UIRefreshState::SketchOpened(sketch.to_string()));
        session
    }

    #[cfg(test)]
    pub fn client(&self) -> &CorrelationClient<T> {
        &self.client
    }

    fn submit(&mut self, command: Command, source: String) {
        if self.busy {
            log::warn!("{} requested while a job is running, ignoring", command);
            return;
        }
        if !self.connected {
            self.alert(AlertKind::Warning, "Not connected!", "Wait for the broker connection", true);
            return;
        }

        self.set_busy(true);
        self.notify(UIRefreshState::ClearAlerts);
        let progress = match command {
            Command::Verify => "Compiling ...",
            Command::Upload => "Compiling and uploading ...",
        };
        self.alert(AlertKind::Info, progress, "", false);

        let sketch = self.client.sketch().to_string();
        if let Err(e) = self.client.submit(command, &sketch, &source) {
            log::error!("Failed to submit {}: {:#}", command, e);
            self.notify(UIRefreshState::ClearAlerts);
            self.alert(AlertKind::Danger, "Failed!", format!("Could not send job: {:#}", e), false);
            self.set_busy(false);
        }
    }

    fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Finished(report) => {
                self.notify(UIRefreshState::ClearAlerts);
                let kind = if report.is_success() { AlertKind::Success } else { AlertKind::Danger };
                self.alert(kind, report.title(), report.message(), false);
                self.set_busy(false);
            }
            Outcome::SketchReplaced(source) => self.notify(UIRefreshState::SourceReplaced(source)),
            Outcome::Failed { route: "response" | "result", reason } => {
                self.notify(UIRefreshState::ClearAlerts);
                self.alert(AlertKind::Danger, "Failed!", format!("Unreadable reply from build server: {}", reason), false);
                self.set_busy(false);
            }
            Outcome::AwaitingResult { command, job_id } => log::debug!("{} accepted as job {}", command, job_id),
            Outcome::SketchUnchanged | Outcome::Failed { .. } | Outcome::Ignored => {}
        }
    }

    fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
        self.notify(UIRefreshState::Busy(busy));
    }

    fn alert(&self, kind: AlertKind, title: impl Into<String>, message: impl Into<String>, fading: bool) {
        self.notify(UIRefreshState::Alert(Alert::new(kind, title, message, fading)));
    }

    fn notify(&self, state: UIRefreshState) {
        if self.ui_refresh_tx.try_send(state).is_err() {
            log::warn!("UI refresh queue full, update dropped");
        }
    }
}

impl<T: Transport> Session<T> for EditorSession<T> {
    fn handle_broker_event(&mut self, event: BrokerEvent) {
        match event {
            BrokerEvent::Connected => {
                self.connected = true;
                if let Err(e) = self.client.resubscribe() {
                    log::error!("Failed to restore subscriptions: {:#}", e);
                    self.alert(AlertKind::Danger, "Subscribe failed!", format!("{:#}", e), false);
                }
                self.notify(UIRefreshState::ConnectionChanged(true));
                self.alert(AlertKind::Info, "", "Connected", true);
            }
            BrokerEvent::ConnectFailed(reason) => {
                log::debug!("Connect attempt failed: {}", reason);
                self.connected = false;
                self.notify(UIRefreshState::ConnectionChanged(false));
                self.alert(AlertKind::Danger, "Connect failed!", "Reconnecting ...", true);
            }
            BrokerEvent::ConnectionLost(reason) => {
                log::debug!("Connection lost: {}", reason);
                self.connected = false;
                self.notify(UIRefreshState::ConnectionChanged(false));
                self.alert(AlertKind::Warning, "Connection was lost!", "Reconnecting ...", true);
            }
            BrokerEvent::Message(message) => {
                let outcome = self.client.dispatch(&message);
                self.apply(outcome);
            }
        }
    }

    fn handle_command(&mut self, command: UICommand) {
        match command {
            UICommand::Submit { command, source } => self.submit(command, source),
            UICommand::SourceEdited(source) => self.client.set_editor_source(source),
            UICommand::StartMode(mode) => {
                log::debug!("StartMode({:?}) ignored in running editor session", mode);
            }
            // Handled by the dispatch loop, which owns the broker link
            UICommand::SwitchBroker(host) => log::warn!("SwitchBroker({}) reached the editor session", host),
        }
    }

    fn switch_transport(&mut self, transport: T, host: &str) -> T {
        let previous = self.client.replace_transport(transport);
        self.connected = false;
        if self.busy {
            log::info!("Job still pending, its result is awaited on {}", host);
            self.set_busy(false);
        }
        self.notify(UIRefreshState::ConnectionChanged(false));
        self.alert(AlertKind::Info, "", format!("Connecting to {} ...", host), true);
        previous
    }
}
