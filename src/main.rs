use eframe::egui;
use embassy_executor::{Executor, Spawner};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use env_logger::Builder;
use log::{LevelFilter, info};
use std::thread;

mod bridge;
mod common;
mod correlation;
mod session;
mod ui;

use crate::bridge::{BrokerLink, LinkEvent, MqttTransport};
use crate::common::config::AppConfig;
use crate::ui::{UICommand, UIRefreshState};

const UI_REFRESH_QUEUE_SIZE: usize = 100;
type UIRefreshQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, UIRefreshState, UI_REFRESH_QUEUE_SIZE>;
type UIRefreshQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, UIRefreshState, UI_REFRESH_QUEUE_SIZE>;
type UIRefreshQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, UIRefreshState, UI_REFRESH_QUEUE_SIZE>;

const UI_COMMAND_QUEUE_SIZE: usize = 100;
type UICommandQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, UICommand, UI_COMMAND_QUEUE_SIZE>;
type UICommandQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, UICommand, UI_COMMAND_QUEUE_SIZE>;
type UICommandQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, UICommand, UI_COMMAND_QUEUE_SIZE>;

// The connection thread blocks on a full queue, which is the only backpressure towards the broker.
const BROKER_EVENT_QUEUE_SIZE: usize = 100;
type BrokerEventQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, LinkEvent, BROKER_EVENT_QUEUE_SIZE>;
type BrokerEventQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, LinkEvent, BROKER_EVENT_QUEUE_SIZE>;
type BrokerEventQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, LinkEvent, BROKER_EVENT_QUEUE_SIZE>;

fn embassy_init(
    spawner: Spawner,
    link: BrokerLink,
    transport: MqttTransport,
    config: AppConfig,
    broker_rx: BrokerEventQueueReceiver,
    ui_refresh_tx: UIRefreshQueueSender,
    ui_command_rx: UICommandQueueReceiver,
) {
    let _ = spawner.spawn(session::session_task(link, transport, config, broker_rx, ui_refresh_tx, ui_command_rx));
}

fn main() {
    // Logging setup
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("arduinobot_ide"), LevelFilter::Debug)
        .filter(Some("rumqttc"), LevelFilter::Warn)
        .parse_default_env()
        .init();

    info!("Starting up");

    let config_path = AppConfig::path_from_args(std::env::args());
    let config = AppConfig::load_or_default(&config_path);
    let history_limit = config.monitor.history;
    let servers = config.broker.server_choices();

    // INTENTIONAL LEAK: the queues live for the whole process and Embassy wants 'static ends.
    let ui_refresh_queue: &'static UIRefreshQueue = Box::leak(Box::new(UIRefreshQueue::new()));
    let ui_command_queue: &'static UICommandQueue = Box::leak(Box::new(UICommandQueue::new()));
    let broker_event_queue: &'static BrokerEventQueue = Box::leak(Box::new(BrokerEventQueue::new()));

    let ui_refresh_tx = ui_refresh_queue.sender();
    let ui_refresh_rx = ui_refresh_queue.receiver();
    let ui_command_tx = ui_command_queue.sender();
    let ui_command_rx = ui_command_queue.receiver();
    let broker_tx = broker_event_queue.sender();
    let broker_rx = broker_event_queue.receiver();

    let (link, transport) = BrokerLink::open(config.broker.clone(), broker_tx).expect("failed to start broker connection");

    // Spawn Embassy executor on a dedicated background thread
    let _embassy_handle = thread::Builder::new()
        .name("embassy-executor".to_string())
        .spawn(move || {
            // Leak the executor to satisfy the 'static lifetime required by run()
            let executor: &'static mut Executor = Box::leak(Box::new(Executor::new()));
            executor.run(|spawner| embassy_init(spawner, link, transport, config, broker_rx, ui_refresh_tx, ui_command_rx));
        })
        .expect("failed to spawn embassy thread");

    // Start the GUI on the main thread (required on macOS)
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1000.0, 720.0]),
        ..Default::default()
    };
    let _ = eframe::run_native(
        "ArduinoBot IDE",
        native_options,
        Box::new(move |cc| Ok(Box::new(ui::AppState::new(ui_refresh_rx, ui_command_tx, servers, history_limit, cc.storage)))),
    );
}
