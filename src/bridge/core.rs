// ABOUTME: The bridge state machine: forward, reconnect, network and status loops
// ABOUTME: Cooperative shutdown via a watch flag; the reconnect loop alone may end early

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncWrite;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinSet;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::bridge::broker::BrokerClient;
use crate::bridge::config::BridgeConfig;
use crate::bridge::error::BridgeResult;
use crate::bridge::message::{ForwardedSms, SendRequest};
use crate::bridge::retry::ReconnectPolicy;
use crate::bridge::status::StatusSink;
use crate::modem::{Mailbox, NetworkMonitor, network};

/// Reason string handed to the fatal callback when the reconnect budget runs out.
pub const FATAL_BROKER_REASON: &str = "broker connection failure";

/// Orchestrates the mailbox, the broker client and the network monitor.
///
/// See the [module docs](crate::bridge) for the loop inventory. Construction
/// is builder-style; [`run`](Self::run) consumes the bridge and resolves when
/// every loop has ended.
pub struct MessageBridge<W, B> {
    mailbox: Mailbox<W>,
    monitor: NetworkMonitor<W>,
    broker: B,
    inbound: mpsc::Receiver<Bytes>,
    config: BridgeConfig,
    status: Option<Arc<dyn StatusSink>>,
    on_fatal: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    running: Arc<watch::Sender<bool>>,
}

/// Cooperative stop signal for a running bridge.
///
/// Loops observe the flag at their next check; an in-flight command wait is
/// not aborted and still runs to completion or timeout. Callers must tolerate
/// one final spurious I/O error from the transport being torn down.
#[derive(Clone)]
pub struct ShutdownHandle {
    running: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn stop(&self) {
        let _ = self.running.send(false);
    }
}

impl<W, B> MessageBridge<W, B>
where
    W: AsyncWrite + Unpin + Send + 'static,
    B: BrokerClient + 'static,
{
    /// Build a bridge over an already-initialized modem channel and a broker
    /// client. `inbound` carries raw payloads published to the inbound topic.
    pub fn new(
        mailbox: Mailbox<W>,
        monitor: NetworkMonitor<W>,
        broker: B,
        inbound: mpsc::Receiver<Bytes>,
        config: BridgeConfig,
    ) -> Self {
        let (running, _) = watch::channel(true);
        Self {
            mailbox,
            monitor,
            broker,
            inbound,
            config,
            status: None,
            on_fatal: None,
            running: Arc::new(running),
        }
    }

    /// Attach an operator status sink.
    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.status = Some(sink);
        self
    }

    /// Register the callback invoked once when broker recovery is abandoned.
    pub fn on_fatal(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_fatal = Some(Arc::new(callback));
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Run the bridge until stopped.
    ///
    /// Attempts one initial broker connection (failure is not fatal; the
    /// reconnect loop takes over), then drives all loops concurrently. The
    /// reconnect loop may terminate early after exhausting its retry budget;
    /// the remaining loops keep running until [`ShutdownHandle::stop`].
    pub async fn run(self) -> BridgeResult<()> {
        let MessageBridge {
            mailbox,
            monitor,
            broker,
            inbound,
            config,
            status,
            on_fatal,
            running,
        } = self;
        let broker = Arc::new(Mutex::new(broker));

        {
            let mut broker = broker.lock().await;
            match broker.connect().await {
                Ok(()) => info!("connected to broker"),
                Err(e) => {
                    warn!(error = %e, "initial broker connection failed; reconnect loop will retry")
                }
            }
        }

        let mut tasks = JoinSet::new();
        tasks.spawn(forward_loop(
            mailbox.clone(),
            Arc::clone(&broker),
            config.clone(),
            status.clone(),
            running.subscribe(),
        ));
        tasks.spawn(reconnect_loop(
            Arc::clone(&broker),
            config.clone(),
            on_fatal,
            running.subscribe(),
        ));
        tasks.spawn(network_loop(monitor, config.clone(), running.subscribe()));
        tasks.spawn(inbound_loop(mailbox, inbound, running.subscribe()));
        if let Some(sink) = status {
            tasks.spawn(status_loop(
                sink,
                config.status_tick_interval,
                running.subscribe(),
            ));
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "bridge task ended abnormally");
            }
        }
        debug!("bridge stopped");
        Ok(())
    }
}

fn is_running(running: &watch::Receiver<bool>) -> bool {
    *running.borrow()
}

/// Sleep for `period` unless the running flag drops first. Returns whether
/// the loop should continue.
async fn idle(running: &mut watch::Receiver<bool>, period: Duration) -> bool {
    tokio::select! {
        _ = time::sleep(period) => {}
        changed = running.wait_for(|running| !running) => {
            let _ = changed;
            return false;
        }
    }
    *running.borrow()
}

async fn forward_loop<W, B>(
    mailbox: Mailbox<W>,
    broker: Arc<Mutex<B>>,
    config: BridgeConfig,
    status: Option<Arc<dyn StatusSink>>,
    mut running: watch::Receiver<bool>,
) where
    W: AsyncWrite + Unpin + Send + 'static,
    B: BrokerClient,
{
    // Indices already passed to delete. An index stays guarded while it keeps
    // appearing in listings (a failed delete), so it is never published or
    // deleted twice; once it stops appearing the modem may reuse it.
    let mut deleted: HashSet<u32> = HashSet::new();

    while is_running(&running) {
        if broker.lock().await.is_connected() {
            match mailbox.list_unread().await {
                Ok(mut records) => {
                    records.sort_by_key(|record| record.index);
                    for record in &records {
                        if deleted.contains(&record.index) {
                            debug!(index = record.index, "skipping already-deleted index");
                            continue;
                        }
                        let payload = match serde_json::to_vec(&ForwardedSms::from_record(record))
                        {
                            Ok(payload) => payload,
                            Err(e) => {
                                warn!(index = record.index, error = %e, "unserializable record");
                                continue;
                            }
                        };
                        let published = broker
                            .lock()
                            .await
                            .publish(&config.outbound_topic, &payload)
                            .await;
                        if let Err(e) = published {
                            warn!(
                                index = record.index,
                                error = %e,
                                "publish failed; record kept for the next poll"
                            );
                            break;
                        }
                        info!(index = record.index, sender = %record.sender, "forwarded message");
                        if let Some(sink) = &status {
                            sink.message(&record.body);
                        }
                        deleted.insert(record.index);
                        mailbox.delete(record.index).await;
                    }
                    deleted.retain(|index| records.iter().any(|r| r.index == *index));
                }
                Err(e) => warn!(error = %e, "mailbox poll failed"),
            }
        }
        if !idle(&mut running, config.poll_interval).await {
            break;
        }
    }
    debug!("forward loop stopped");
}

async fn reconnect_loop<B>(
    broker: Arc<Mutex<B>>,
    config: BridgeConfig,
    on_fatal: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    mut running: watch::Receiver<bool>,
) where
    B: BrokerClient,
{
    let mut policy = ReconnectPolicy::new(config.max_retries);
    while is_running(&running) {
        {
            let mut broker = broker.lock().await;
            if !broker.is_connected() {
                info!(
                    attempt = policy.retries() + 1,
                    max = config.max_retries,
                    "reconnecting to broker"
                );
                match broker.connect().await {
                    Ok(()) => {
                        info!("broker connection restored");
                        policy.on_success();
                    }
                    Err(e) => {
                        warn!(error = %e, "broker reconnect failed");
                        policy.on_failure();
                        if policy.is_exhausted() {
                            error!(retries = policy.retries(), "giving up on broker recovery");
                            if let Some(callback) = &on_fatal {
                                callback(FATAL_BROKER_REASON);
                            }
                            // Only this loop ends; the others keep running.
                            return;
                        }
                    }
                }
            }
        }
        if !idle(&mut running, config.reconnect_interval).await {
            break;
        }
    }
    debug!("reconnect loop stopped");
}

async fn network_loop<W>(
    monitor: NetworkMonitor<W>,
    config: BridgeConfig,
    mut running: watch::Receiver<bool>,
) where
    W: AsyncWrite + Unpin,
{
    while is_running(&running) {
        match monitor.check_once().await {
            Ok(raw) => match network::classify(&raw) {
                // Extension point: sustained non-registration could escalate
                // to a hard-disconnect callback. Currently report-only.
                Some(status) => info!(
                    %raw,
                    ?status,
                    registered = status.is_registered(),
                    "network registration status"
                ),
                None => warn!(%raw, "unparseable registration status"),
            },
            Err(e) => warn!(error = %e, "registration query failed"),
        }
        if !idle(&mut running, config.network_check_interval).await {
            break;
        }
    }
    debug!("network loop stopped");
}

async fn inbound_loop<W>(
    mailbox: Mailbox<W>,
    mut inbound: mpsc::Receiver<Bytes>,
    mut running: watch::Receiver<bool>,
) where
    W: AsyncWrite + Unpin + Send + 'static,
{
    loop {
        tokio::select! {
            changed = running.wait_for(|running| !running) => {
                let _ = changed;
                break;
            }
            payload = inbound.recv() => {
                let Some(payload) = payload else {
                    debug!("inbound channel closed");
                    break;
                };
                match serde_json::from_slice::<SendRequest>(&payload) {
                    Ok(request) => {
                        debug!(to = %request.to, "dispatching outbound message");
                        let mailbox = mailbox.clone();
                        // Detached: a slow submit must not block further
                        // inbound traffic.
                        tokio::spawn(async move {
                            if let Err(e) = mailbox.send(&request.to, &request.text).await {
                                warn!(to = %request.to, error = %e, "outbound submit failed");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "dropping malformed inbound payload"),
                }
            }
        }
    }
    debug!("inbound loop stopped");
}

async fn status_loop(
    sink: Arc<dyn StatusSink>,
    interval: Duration,
    mut running: watch::Receiver<bool>,
) {
    let mut count: u64 = 0;
    while is_running(&running) {
        count += 1;
        sink.tick(count);
        if !idle(&mut running, interval).await {
            break;
        }
    }
    debug!("status loop stopped");
}
