//! Session task: the single dispatch loop between broker and UI.
//!
//! Runs on the Embassy executor. It waits for the user to pick a mode, then
//! `select`s over the broker event queue and the UI command queue. Every inbound
//! message is handled to completion before the next one is taken.

pub mod editor;
pub mod monitor;

use embassy_futures::select::{Either, select};

use crate::bridge::{BrokerEvent, BrokerLink, MqttTransport, Transport};
use crate::common::config::AppConfig;
use crate::ui::{Alert, AlertKind, OperatingMode, UICommand, UIRefreshState};
use crate::{BrokerEventQueueReceiver, UICommandQueueReceiver, UIRefreshQueueSender};

use editor::EditorSession;
use monitor::MonitorSession;

/// What the dispatch loop needs from a running mode.
pub trait Session<T: Transport> {
    fn handle_broker_event(&mut self, event: BrokerEvent);
    fn handle_command(&mut self, command: UICommand);
    /// Continue on a new broker connection, returning the previous handle.
    fn switch_transport(&mut self, transport: T, host: &str) -> T;
}

/// Wait for the mode chosen on the mode selector screen.
///
/// Commands other than `StartMode` are dropped; broker events stay queued until
/// the session starts.
async fn wait_for_mode(ui_command_rx: &UICommandQueueReceiver) -> OperatingMode {
    loop {
        match ui_command_rx.receive().await {
            UICommand::StartMode(mode) => {
                log::info!("Starting {:?}", mode);
                return mode;
            }
            other => log::debug!("{:?} received before a mode was selected (ignored)", other),
        }
    }
}

#[embassy_executor::task]
pub async fn session_task(
    link: BrokerLink,
    transport: MqttTransport,
    config: AppConfig,
    broker_rx: BrokerEventQueueReceiver,
    ui_refresh_tx: UIRefreshQueueSender,
    ui_command_rx: UICommandQueueReceiver,
) {
    match wait_for_mode(&ui_command_rx).await {
        OperatingMode::SketchEditor => {
            let session = EditorSession::new(transport, &config.editor.sketch, ui_refresh_tx);
            run(session, link, broker_rx, ui_refresh_tx, ui_command_rx).await
        }
        OperatingMode::SensorMonitor => {
            let session = MonitorSession::new(transport, config.monitor.topics.clone(), ui_refresh_tx);
            run(session, link, broker_rx, ui_refresh_tx, ui_command_rx).await
        }
    }
}

async fn run<S: Session<MqttTransport>>(
    mut session: S,
    mut link: BrokerLink,
    broker_rx: BrokerEventQueueReceiver,
    ui_refresh_tx: UIRefreshQueueSender,
    ui_command_rx: UICommandQueueReceiver,
) {
    loop {
        match select(broker_rx.receive(), ui_command_rx.receive()).await {
            Either::First(event) => match event.on_link(link.id()) {
                Some(event) => session.handle_broker_event(event),
                None => log::debug!("Event from a closed broker connection dropped"),
            },
            Either::Second(UICommand::SwitchBroker(host)) => switch_broker(&mut session, &mut link, &host, ui_refresh_tx),
            Either::Second(command) => session.handle_command(command),
        }
    }
}

fn switch_broker<S: Session<MqttTransport>>(session: &mut S, link: &mut BrokerLink, host: &str, ui_refresh_tx: UIRefreshQueueSender) {
    if host == link.host() {
        return;
    }
    match link.switch(host) {
        Ok(transport) => {
            let mut previous = session.switch_transport(transport, host);
            if let Err(e) = previous.disconnect() {
                log::warn!("Previous broker connection: {:#}", e);
            }
        }
        Err(e) => {
            log::error!("Failed to switch to {}: {:#}", host, e);
            let _ = ui_refresh_tx.try_send(UIRefreshState::Alert(Alert::new(AlertKind::Danger, "Connect failed!", format!("{}: {:#}", host, e), false)));
        }
    }
    let _ = ui_refresh_tx.try_send(UIRefreshState::BrokerSelected(link.host().to_string()));
}
