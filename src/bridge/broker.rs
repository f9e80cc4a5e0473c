// ABOUTME: Broker client trait: the seam between the bridge and any pub/sub implementation
// ABOUTME: Futures are Send so bridge loops can run as spawned tasks

use std::future::Future;

use crate::bridge::error::BrokerError;

/// A publish/subscribe broker session.
///
/// The bridge drives this trait from its loops; the concrete transport (see
/// [`crate::mqtt::MqttBroker`]) delivers inbound publishes on a separate
/// `mpsc` channel handed to the bridge at construction, so the trait itself
/// stays request-shaped.
///
/// Connection state must only change through explicit events: a successful
/// [`connect`](Self::connect), an explicit [`disconnect`](Self::disconnect)
/// or the implementation observing the session drop. It is never assumed.
pub trait BrokerClient: Send {
    /// Open the broker session and subscribe to the configured inbound topic.
    fn connect(&mut self) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Publish `payload` to `topic`.
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Close the session.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send;

    /// Current session state, as last reported by an explicit event.
    fn is_connected(&self) -> bool;
}
