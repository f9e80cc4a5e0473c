//! GSM modem ⇄ MQTT SMS gateway.
//!
//! Bridges a cellular modem's text-messaging capability to a
//! publish/subscribe broker: inbound broker messages go out as SMS, incoming
//! SMS are forwarded to the broker. The crate is built from two layers:
//!
//! * the AT protocol engine — [`channel::CommandChannel`] serializes
//!   command/response exchanges over the serial transport while
//!   [`channel::ResponseReader`] drains it in the background;
//! * the bridge — [`bridge::MessageBridge`] layers mailbox polling, record
//!   parsing and broker-connection recovery on top.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sms_gateway::bridge::{BridgeConfig, BrokerConfig, MessageBridge};
//! use sms_gateway::modem::{self, Mailbox, NetworkMonitor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (reader, writer) = sms_gateway::serial::open("/dev/ttyUSB0", 9600)?;
//!     let (channel, response_reader) = sms_gateway::command_channel(reader, writer);
//!     tokio::spawn(response_reader.run());
//!     let channel = Arc::new(channel);
//!     modem::initialize(&channel).await?;
//!
//!     let config = BridgeConfig::default();
//!     let broker_config = BrokerConfig::new("broker.example.com", 1883);
//!     let (broker, inbound) =
//!         sms_gateway::mqtt::mqtt_broker(&broker_config, &config.inbound_topic);
//!
//!     let mailbox = Mailbox::new(Arc::clone(&channel), config.command_timeout);
//!     let monitor = NetworkMonitor::new(channel, config.command_timeout);
//!     MessageBridge::new(mailbox, monitor, broker, inbound, config)
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod channel;
pub mod command;
pub mod error;
pub mod modem;
pub mod mqtt;
pub mod serial;

#[cfg(test)]
mod tests;

// Re-export the protocol engine for direct access
pub use channel::{CommandChannel, ResponseReader, command_channel};
pub use command::AtCommand;
pub use error::{AtError, AtResult};

// Re-export the main bridge API for easy access
pub use bridge::{
    BridgeConfig, BridgeError, BridgeResult, BrokerClient, BrokerConfig, BrokerError,
    MessageBridge, NullStatusSink, ShutdownHandle, StatusSink,
};
pub use modem::{Mailbox, NetworkMonitor, RegistrationStatus, SmsRecord};
