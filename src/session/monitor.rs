//! Sensor monitor session: subscribe to the configured filters and forward every
//! message to the UI as a [`SensorReading`].

use chrono::{DateTime, Local};

use super::Session;
use crate::UIRefreshQueueSender;
use crate::bridge::{BrokerEvent, InboundMessage, Transport};
use crate::ui::{Alert, AlertKind, UICommand, UIRefreshState};

/// One decoded message shown in the monitor table.
#[derive(Debug, Clone)]
pub struct SensorReading {
    pub topic: String,
    pub received_at: DateTime<Local>,
    /// Pretty-printed JSON, or the raw text when the payload is not JSON
    pub body: String,
}

impl SensorReading {
    pub fn from_message(message: &InboundMessage, received_at: DateTime<Local>) -> Self {
        let body = match serde_json::from_slice::<serde_json::Value>(&message.payload) {
            Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| message.payload_text().into_owned()),
            Err(_) => message.payload_text().into_owned(),
        };
        Self {
            topic: message.topic.clone(),
            received_at,
            body,
        }
    }
}

pub struct MonitorSession<T: Transport> {
    transport: T,
    topics: Vec<String>,
    ui_refresh_tx: UIRefreshQueueSender,
}

impl<T: Transport> MonitorSession<T> {
    pub fn new(transport: T, topics: Vec<String>, ui_refresh_tx: UIRefreshQueueSender) -> Self {
        Self {
            transport,
            topics,
            ui_refresh_tx,
        }
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn alert(&self, kind: AlertKind, title: &str, message: &str, fading: bool) {
        self.notify(UIRefreshState::Alert(Alert::new(kind, title, message, fading)));
    }

    fn notify(&self, state: UIRefreshState) {
        if self.ui_refresh_tx.try_send(state).is_err() {
            log::warn!("UI refresh queue full, update dropped");
        }
    }
}

impl<T: Transport> Session<T> for MonitorSession<T> {
    fn handle_broker_event(&mut self, event: BrokerEvent) {
        match event {
            BrokerEvent::Connected => {
                for topic in &self.topics {
                    if let Err(e) = self.transport.subscribe(topic) {
                        log::error!("{:#}", e);
                    }
                }
                self.notify(UIRefreshState::ConnectionChanged(true));
                self.alert(AlertKind::Info, "", "Connected", true);
            }
            BrokerEvent::ConnectFailed(_) => {
                self.notify(UIRefreshState::ConnectionChanged(false));
                self.alert(AlertKind::Danger, "Connect failed!", "Reconnecting ...", true);
            }
            BrokerEvent::ConnectionLost(_) => {
                self.notify(UIRefreshState::ConnectionChanged(false));
                self.alert(AlertKind::Warning, "Connection was lost!", "Reconnecting ...", true);
            }
            BrokerEvent::Message(message) => {
                log::debug!("Topic: {} payload: {}", message.topic, message.payload_text());
                self.notify(UIRefreshState::SensorReading(SensorReading::from_message(&message, Local::now())));
            }
        }
    }

    fn handle_command(&mut self, command: UICommand) {
        log::debug!("{:?} ignored in sensor monitor", command);
    }

    fn switch_transport(&mut self, transport: T, host: &str) -> T {
        let previous = std::mem::replace(&mut self.transport, transport);
        self.notify(UIRefreshState::ConnectionChanged(false));
        self.alert(AlertKind::Info, "", &format!("Connecting to {} ...", host), true);
        previous
    }
}
