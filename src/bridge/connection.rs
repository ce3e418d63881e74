//! Connection driver: turns the blocking `rumqttc` event loop into a channel of
//! [`BrokerEvent`]s for the session task.
//!
//! `rumqttc` reconnects by itself the next time the connection is polled after an
//! error, so the driver only has to report the error, wait and keep iterating.
//! Every event carries the id of the link it came from; after a broker switch the
//! session drops whatever the previous driver still delivers.

use rumqttc::{ConnectReturnCode, Connection, ConnectionError, Event, Packet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::BrokerEventQueueSender;

/// Message delivered by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload as text for logging, invalid UTF-8 replaced.
    pub fn payload_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Everything the session task hears from the broker side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// CONNACK received, subscriptions have to be (re)established.
    Connected,
    /// Connecting failed before the session was up.
    ConnectFailed(String),
    /// An established connection dropped.
    ConnectionLost(String),
    Message(InboundMessage),
}

/// Broker event tagged with the connection it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEvent {
    pub link: u32,
    pub event: BrokerEvent,
}

impl LinkEvent {
    /// The event, if it belongs to the link currently in use.
    pub fn on_link(self, current: u32) -> Option<BrokerEvent> {
        (self.link == current).then_some(self.event)
    }
}

/// Tracks whether the last error happened on a live connection.
#[derive(Debug, Default)]
pub struct LinkState {
    connected: bool,
}

impl LinkState {
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Map one event loop notification to a broker event, `None` for protocol noise.
    pub fn on_event(&mut self, event: Event) -> Option<BrokerEvent> {
        match event {
            Event::Incoming(Packet::ConnAck(ack)) if ack.code == ConnectReturnCode::Success => {
                self.connected = true;
                Some(BrokerEvent::Connected)
            }
            Event::Incoming(Packet::ConnAck(ack)) => {
                self.connected = false;
                Some(BrokerEvent::ConnectFailed(format!("{:?}", ack.code)))
            }
            Event::Incoming(Packet::Publish(publish)) => Some(BrokerEvent::Message(InboundMessage::new(publish.topic, publish.payload.to_vec()))),
            _ => None,
        }
    }

    pub fn on_error(&mut self, error: String) -> BrokerEvent {
        if std::mem::take(&mut self.connected) {
            BrokerEvent::ConnectionLost(error)
        } else {
            BrokerEvent::ConnectFailed(error)
        }
    }
}

/// Drive the connection until `stop` is raised. Runs on a dedicated thread.
pub fn run_connection(mut connection: Connection, link: u32, stop: Arc<AtomicBool>, events: BrokerEventQueueSender, reconnect_interval: Duration) {
    let mut state = LinkState::default();
    let send = |event: BrokerEvent| embassy_futures::block_on(events.send(LinkEvent { link, event }));
    for notification in connection.iter() {
        if stop.load(Ordering::Acquire) {
            break;
        }
        match notification {
            Ok(event) => {
                if let Some(event) = state.on_event(event) {
                    send(event);
                }
            }
            Err(error) => {
                send(report_error(&mut state, error));
                std::thread::sleep(reconnect_interval);
            }
        }
    }
    log::info!("Broker connection {} closed", link);
}

fn report_error(state: &mut LinkState, error: ConnectionError) -> BrokerEvent {
    let event = state.on_error(error.to_string());
    match &event {
        BrokerEvent::ConnectionLost(e) => log::warn!("Connection lost: {}", e),
        _ => log::warn!("Failed to connect: {}", error),
    }
    event
}
