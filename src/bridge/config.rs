// ABOUTME: Configuration for the bridge loops and the broker connection
// ABOUTME: Builder-style with_* methods over sensible defaults

use std::time::Duration;

use crate::command::DEFAULT_COMMAND_TIMEOUT;

/// Broker connection parameters.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Client identifier presented to the broker.
    pub client_id: String,
    /// Bound on waiting for the session to come up during a connect attempt.
    pub connect_timeout: Duration,
}

impl BrokerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            client_id: "sms-gateway".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Timing and topic configuration for the bridge loops.
///
/// # Example
///
/// ```rust
/// use sms_gateway::bridge::BridgeConfig;
/// use std::time::Duration;
///
/// let config = BridgeConfig::default()
///     .with_topics("sms/send", "sms/received")
///     .with_reconnect(Duration::from_secs(10), 5);
/// assert_eq!(config.max_retries, 5);
/// ```
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Topic carrying inbound send requests.
    pub inbound_topic: String,
    /// Topic receiving forwarded messages.
    pub outbound_topic: String,
    /// Pause between mailbox polls, whether or not records were found.
    pub poll_interval: Duration,
    /// Pause between broker reconnect attempts.
    pub reconnect_interval: Duration,
    /// Reconnect attempts tolerated before the fatal callback fires.
    pub max_retries: u32,
    /// Pause between registration-status queries.
    pub network_check_interval: Duration,
    /// Pause between status-sink ticks.
    pub status_tick_interval: Duration,
    /// Per-exchange command timeout for modem operations.
    pub command_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            inbound_topic: "sms/send".to_string(),
            outbound_topic: "sms/received".to_string(),
            poll_interval: Duration::from_secs(2),
            reconnect_interval: Duration::from_secs(10),
            max_retries: 5,
            network_check_interval: Duration::from_secs(60),
            status_tick_interval: Duration::from_millis(250),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl BridgeConfig {
    pub fn with_topics(
        mut self,
        inbound_topic: impl Into<String>,
        outbound_topic: impl Into<String>,
    ) -> Self {
        self.inbound_topic = inbound_topic.into();
        self.outbound_topic = outbound_topic.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_reconnect(mut self, interval: Duration, max_retries: u32) -> Self {
        self.reconnect_interval = interval;
        self.max_retries = max_retries;
        self
    }

    pub fn with_network_check_interval(mut self, interval: Duration) -> Self {
        self.network_check_interval = interval;
        self
    }

    pub fn with_status_tick_interval(mut self, interval: Duration) -> Self {
        self.status_tick_interval = interval;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}
