//! Broker side of the application: the connection handle passed to the correlation
//! client, the thread that drives the MQTT event loop and switching between brokers.

pub mod connection;
pub mod link;
pub mod transport;

pub use connection::{BrokerEvent, InboundMessage, LinkEvent};
pub use link::BrokerLink;
pub use transport::{MqttTransport, Transport};
