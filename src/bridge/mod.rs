// ABOUTME: Bridge module wiring the modem mailbox to a publish/subscribe broker
// ABOUTME: Exports the bridge state machine, its config, errors, broker trait and status sink

//! The message bridge.
//!
//! [`MessageBridge`] orchestrates a [`Mailbox`](crate::modem::Mailbox), a
//! [`BrokerClient`] and a [`NetworkMonitor`](crate::modem::NetworkMonitor)
//! with four cooperative loops:
//!
//! * forward — poll unread messages, publish them, delete them
//! * reconnect — fixed-interval broker recovery with a bounded retry budget
//! * network — periodic registration-status queries
//! * status — tick an injected [`StatusSink`]
//!
//! Inbound broker payloads (`{"to": …, "text": …}`) are dispatched to the
//! mailbox as detached send tasks. Stopping is cooperative through a
//! [`ShutdownHandle`]; an in-flight command wait always runs to completion
//! or timeout.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sms_gateway::bridge::{BridgeConfig, BrokerConfig, MessageBridge};
//! use sms_gateway::modem::{Mailbox, NetworkMonitor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (reader, writer) = sms_gateway::serial::open("/dev/ttyUSB0", 9600)?;
//! let (channel, response_reader) = sms_gateway::command_channel(reader, writer);
//! tokio::spawn(response_reader.run());
//! let channel = Arc::new(channel);
//!
//! let config = BridgeConfig::default().with_topics("sms/send", "sms/received");
//! let broker_config = BrokerConfig::new("broker.example.com", 1883);
//! let (broker, inbound) = sms_gateway::mqtt::mqtt_broker(&broker_config, &config.inbound_topic);
//!
//! let mailbox = Mailbox::new(Arc::clone(&channel), config.command_timeout);
//! let monitor = NetworkMonitor::new(channel, config.command_timeout);
//! MessageBridge::new(mailbox, monitor, broker, inbound, config)
//!     .run()
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod broker;
pub mod config;
pub mod core;
pub mod error;
pub mod message;
pub mod retry;
pub mod status;

pub use broker::BrokerClient;
pub use config::{BridgeConfig, BrokerConfig};
pub use core::{FATAL_BROKER_REASON, MessageBridge, ShutdownHandle};
pub use error::{BridgeError, BridgeResult, BrokerError};
pub use message::{ForwardedSms, SendRequest};
pub use retry::ReconnectPolicy;
pub use status::{NullStatusSink, StatusSink};
