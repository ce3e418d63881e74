//! Connection handle used by the correlation client.
//!
//! The client never owns the broker connection itself; it is handed something that
//! can subscribe, unsubscribe and publish. In the application that is an MQTT client,
//! in tests a recorder.
//!
//! The MQTT calls never block. The connection thread may itself be waiting on the
//! full broker event queue that the session task drains, so a blocking send from the
//! session task into the equally bounded request queue could stall both. A full
//! request queue is reported as an error instead.

use anyhow::Context;
use rumqttc::{Client, Connection, MqttOptions, QoS};
use uuid::Uuid;

use crate::common::config::BrokerConfig;

/// Capacity of the request queue between `Client` handles and the connection driver.
const CLIENT_REQUEST_CAPACITY: usize = 64;

/// Publish/subscribe operations the correlation client needs.
pub trait Transport {
    fn subscribe(&mut self, topic: &str) -> anyhow::Result<()>;
    fn unsubscribe(&mut self, topic: &str) -> anyhow::Result<()>;
    fn publish(&mut self, topic: &str, payload: Vec<u8>, retained: bool) -> anyhow::Result<()>;
    /// Close the connection this handle belongs to.
    fn disconnect(&mut self) -> anyhow::Result<()>;
}

/// [`Transport`] over a `rumqttc` client. All traffic is QoS 0.
#[derive(Clone)]
pub struct MqttTransport {
    client: Client,
}

impl MqttTransport {
    /// Create the client handle and the connection that has to be driven on its own thread.
    ///
    /// Every call gets a fresh client id, brokers drop a session when a second client
    /// connects with the same id.
    pub fn connect(config: &BrokerConfig) -> (Self, Connection) {
        let client_id = Uuid::new_v4().hyphenated().to_string();
        let mut options = MqttOptions::new(client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(config.keep_alive());
        options.set_clean_session(true);
        if let Some(username) = &config.username {
            options.set_credentials(username.clone(), config.password.clone().unwrap_or_default());
        }
        if config.use_tls {
            options.set_transport(rumqttc::Transport::tls_with_default_config());
        }

        log::info!("Connecting to {}:{} as {} (tls: {})", config.host, config.port, client_id, config.use_tls);
        let (client, connection) = Client::new(options, CLIENT_REQUEST_CAPACITY);
        (Self { client }, connection)
    }
}

impl Transport for MqttTransport {
    fn subscribe(&mut self, topic: &str) -> anyhow::Result<()> {
        self.client.try_subscribe(topic, QoS::AtMostOnce).with_context(|| format!("subscribe {}", topic))?;
        log::debug!("Subscribed: {}", topic);
        Ok(())
    }

    fn unsubscribe(&mut self, topic: &str) -> anyhow::Result<()> {
        self.client.try_unsubscribe(topic).with_context(|| format!("unsubscribe {}", topic))?;
        log::debug!("Unsubscribed: {}", topic);
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: Vec<u8>, retained: bool) -> anyhow::Result<()> {
        let len = payload.len();
        self.client
            .try_publish(topic, QoS::AtMostOnce, retained, payload)
            .with_context(|| format!("publish {}", topic))?;
        log::debug!("Published: {} ({} bytes, retained: {})", topic, len, retained);
        Ok(())
    }

    fn disconnect(&mut self) -> anyhow::Result<()> {
        self.client.try_disconnect().context("disconnect")
    }
}
