//! The live broker connection and switching to another broker at runtime.

use anyhow::Context;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use super::connection::run_connection;
use super::transport::MqttTransport;
use crate::BrokerEventQueueSender;
use crate::common::config::BrokerConfig;

/// Owns the driver thread of the current connection.
pub struct BrokerLink {
    config: BrokerConfig,
    events: BrokerEventQueueSender,
    id: u32,
    stop: Arc<AtomicBool>,
}

impl BrokerLink {
    /// Connect to the configured broker and start driving the connection.
    pub fn open(config: BrokerConfig, events: BrokerEventQueueSender) -> anyhow::Result<(Self, MqttTransport)> {
        let stop = Arc::new(AtomicBool::new(false));
        let transport = spawn_driver(&config, 0, stop.clone(), events)?;
        Ok((Self { config, events, id: 0, stop }, transport))
    }

    /// Id carried by the events of the current connection.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Connect to `host` with the remaining settings unchanged and retire the current driver.
    ///
    /// The caller disconnects the previous transport; this only tells its driver to stop.
    pub fn switch(&mut self, host: &str) -> anyhow::Result<MqttTransport> {
        let config = self.config.for_host(host);
        let id = self.id.wrapping_add(1);
        let stop = Arc::new(AtomicBool::new(false));
        let transport = spawn_driver(&config, id, stop.clone(), self.events)?;

        self.stop.store(true, Ordering::Release);
        log::info!("Switched broker {} -> {} (link {})", self.config.host, config.host, id);
        self.config = config;
        self.id = id;
        self.stop = stop;
        Ok(transport)
    }
}

fn spawn_driver(config: &BrokerConfig, id: u32, stop: Arc<AtomicBool>, events: BrokerEventQueueSender) -> anyhow::Result<MqttTransport> {
    let (transport, connection) = MqttTransport::connect(config);
    let reconnect_interval = config.reconnect_interval();
    thread::Builder::new()
        .name(format!("mqtt-connection-{}", id))
        .spawn(move || run_connection(connection, id, stop, events, reconnect_interval))
        .context("failed to spawn mqtt connection thread")?;
    Ok(transport)
}
