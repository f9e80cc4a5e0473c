// ABOUTME: Gateway daemon: wires serial transport, modem init, MQTT broker and the bridge
// ABOUTME: Stops cooperatively on ctrl-c; credentials come from the environment

use std::env;
use std::sync::Arc;

use argh::FromArgs;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sms_gateway::bridge::{BridgeConfig, BrokerConfig, MessageBridge};
use sms_gateway::modem::{self, Mailbox, NetworkMonitor};

#[derive(FromArgs)]
/// GSM modem to MQTT SMS gateway.
struct Args {
    /// serial device the modem is attached to
    #[argh(option, default = "String::from(\"/dev/ttyUSB0\")")]
    device: String,

    /// serial baud rate
    #[argh(option, default = "9600")]
    baud: u32,

    /// MQTT broker host
    #[argh(option)]
    broker: String,

    /// MQTT broker port
    #[argh(option, default = "1883")]
    port: u16,

    /// topic carrying inbound send requests
    #[argh(option, default = "String::from(\"sms/send\")")]
    inbound_topic: String,

    /// topic receiving forwarded messages
    #[argh(option, default = "String::from(\"sms/received\")")]
    outbound_topic: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let args: Args = argh::from_env();

    let mut broker_config = BrokerConfig::new(args.broker.clone(), args.port);
    if let (Ok(username), Ok(password)) = (env::var("MQTT_USER"), env::var("MQTT_PASSWORD")) {
        broker_config = broker_config.with_credentials(username, password);
    }
    let config = BridgeConfig::default().with_topics(args.inbound_topic, args.outbound_topic);

    let (reader, writer) = sms_gateway::serial::open(&args.device, args.baud)?;
    let (channel, response_reader) = sms_gateway::command_channel(reader, writer);
    tokio::spawn(response_reader.run());
    let channel = Arc::new(channel);

    info!(device = %args.device, baud = args.baud, "initializing modem");
    modem::initialize(&channel).await?;

    let (broker, inbound) = sms_gateway::mqtt::mqtt_broker(&broker_config, &config.inbound_topic);
    let mailbox = Mailbox::new(Arc::clone(&channel), config.command_timeout);
    let monitor = NetworkMonitor::new(channel, config.command_timeout);

    let bridge = MessageBridge::new(mailbox, monitor, broker, inbound, config)
        .on_fatal(|reason| error!(reason, "bridge fatal"));
    let shutdown = bridge.shutdown_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            shutdown.stop();
        }
    });

    info!(broker = %args.broker, port = args.port, "bridge running");
    bridge.run().await?;
    Ok(())
}
