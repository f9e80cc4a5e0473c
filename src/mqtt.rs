// ABOUTME: rumqttc-backed BrokerClient with a background event-loop driver task
// ABOUTME: Session state changes only on explicit ConnAck/Disconnect/error events

use std::time::Duration;

use bytes::Bytes;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::{debug, warn};

use crate::bridge::{BrokerClient, BrokerConfig, BrokerError};

const INBOUND_CHANNEL_CAPACITY: usize = 32;
const REQUEST_CHANNEL_CAPACITY: usize = 16;

/// MQTT broker session.
///
/// The connection itself is driven by a background task polling the rumqttc
/// event loop; this handle tracks session state through the events that task
/// observes and queues publish/subscribe requests onto it.
pub struct MqttBroker {
    client: AsyncClient,
    connected: watch::Receiver<bool>,
    inbound_topic: String,
    connect_timeout: Duration,
}

/// Build the broker client and the channel delivering inbound publishes.
///
/// Spawns the event-loop driver task; the returned receiver yields the raw
/// payload of every publish arriving on `inbound_topic`.
pub fn mqtt_broker(config: &BrokerConfig, inbound_topic: &str) -> (MqttBroker, mpsc::Receiver<Bytes>) {
    let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
    options.set_keep_alive(Duration::from_secs(60));
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        options.set_credentials(username.clone(), password.clone());
    }

    let (client, event_loop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
    let (connected_tx, connected_rx) = watch::channel(false);
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
    tokio::spawn(drive_event_loop(
        event_loop,
        connected_tx,
        inbound_tx,
        inbound_topic.to_string(),
    ));

    let broker = MqttBroker {
        client,
        connected: connected_rx,
        inbound_topic: inbound_topic.to_string(),
        connect_timeout: config.connect_timeout,
    };
    (broker, inbound_rx)
}

async fn drive_event_loop(
    mut event_loop: EventLoop,
    connected: watch::Sender<bool>,
    inbound: mpsc::Sender<Bytes>,
    inbound_topic: String,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                debug!("broker session established");
                connected.send_replace(true);
            }
            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                if publish.topic == inbound_topic {
                    if inbound.send(publish.payload).await.is_err() {
                        debug!("inbound consumer gone, stopping event loop driver");
                        return;
                    }
                } else {
                    debug!(topic = %publish.topic, "ignoring publish on unexpected topic");
                }
            }
            Ok(Event::Incoming(Incoming::Disconnect)) => {
                warn!("broker sent disconnect");
                connected.send_replace(false);
            }
            Ok(_) => {}
            Err(e) => {
                connected.send_replace(false);
                warn!(error = %e, "broker connection lost");
                // The event loop reconnects on the next poll; pace the retries.
                time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

impl BrokerClient for MqttBroker {
    async fn connect(&mut self) -> Result<(), BrokerError> {
        let session_up = self.connected.wait_for(|up| *up);
        match time::timeout(self.connect_timeout, session_up).await {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => return Err(BrokerError::Client("event loop terminated".to_string())),
            Err(_) => return Err(BrokerError::Timeout),
        }
        // Subscriptions do not survive a session drop; refresh on every connect.
        self.client
            .subscribe(&self.inbound_topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| BrokerError::Client(e.to_string()))
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if !*self.connected.borrow() {
            return Err(BrokerError::NotConnected);
        }
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload.to_vec())
            .await
            .map_err(|e| BrokerError::Client(e.to_string()))
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self.client.disconnect().await {
            debug!(error = %e, "broker disconnect request failed");
        }
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }
}
