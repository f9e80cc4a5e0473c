//! Integration tests for the command channel, the mailbox and the bridge.
//!
//! The modem side of the serial transport is simulated with a scripted
//! responder over `tokio::io::duplex`; the broker is a mock `BrokerClient`.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream, duplex};
use tokio::sync::mpsc;
use tokio::time;

use crate::bridge::{BridgeConfig, BrokerClient, BrokerError, MessageBridge, StatusSink};
use crate::channel::{CommandChannel, command_channel};
use crate::command::AtCommand;
use crate::error::AtError;
use crate::modem::{Mailbox, NetworkMonitor};

type HostWriter = tokio::io::WriteHalf<DuplexStream>;

/// Build a command channel wired to the returned peer stream and spawn its
/// response reader.
fn host_channel(buffer: usize) -> (Arc<CommandChannel<HostWriter>>, DuplexStream) {
    let (host, modem) = duplex(buffer);
    let (read, write) = tokio::io::split(host);
    let (channel, reader) = command_channel(read, write);
    tokio::spawn(reader.run());
    (Arc::new(channel), modem)
}

/// Line-oriented fake modem: reads commands, answers per the script.
/// Returning `None` from the script leaves the command unanswered.
async fn line_modem(stream: DuplexStream, mut script: impl FnMut(&str) -> Option<String> + Send) {
    let (read, mut write) = tokio::io::split(stream);
    let mut lines = BufReader::new(read).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(reply) = script(line) {
            if write.write_all(reply.as_bytes()).await.is_err() {
                break;
            }
        }
    }
}

/// Capture every byte the channel writes, without ever responding.
fn capture_bytes(mut stream: DuplexStream) -> Arc<StdMutex<Vec<u8>>> {
    let captured = Arc::new(StdMutex::new(Vec::new()));
    let sink = Arc::clone(&captured);
    tokio::spawn(async move {
        let mut buf = [0u8; 256];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => sink.lock().unwrap().extend_from_slice(&buf[..n]),
            }
        }
    });
    captured
}

#[derive(Clone)]
struct MockBrokerState {
    connected: Arc<AtomicBool>,
    fail_connect: bool,
    connect_attempts: Arc<AtomicU32>,
    published: Arc<StdMutex<Vec<(String, Vec<u8>)>>>,
}

impl MockBrokerState {
    fn new(fail_connect: bool) -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(false)),
            fail_connect,
            connect_attempts: Arc::new(AtomicU32::new(0)),
            published: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }
}

struct MockBroker {
    state: MockBrokerState,
}

impl BrokerClient for MockBroker {
    async fn connect(&mut self) -> Result<(), BrokerError> {
        self.state.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_connect {
            Err(BrokerError::Client("connection refused".to_string()))
        } else {
            self.state.connected.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::NotConnected);
        }
        self.state
            .published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.state.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }
}

struct CountingSink {
    ticks: AtomicU32,
    messages: StdMutex<Vec<String>>,
}

impl CountingSink {
    fn new() -> Self {
        Self {
            ticks: AtomicU32::new(0),
            messages: StdMutex::new(Vec::new()),
        }
    }
}

impl StatusSink for CountingSink {
    fn tick(&self, _count: u64) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }

    fn message(&self, text: &str) {
        self.messages.lock().unwrap().push(text.to_string());
    }
}

mod channel_tests {
    use super::*;

    #[tokio::test]
    async fn returns_trimmed_response_on_terminal_ok() {
        let (channel, modem) = host_channel(1024);
        tokio::spawn(line_modem(modem, |cmd| {
            assert_eq!(cmd, "AT");
            Some("\r\nOK\r\n".to_string())
        }));

        let response = channel
            .send(AtCommand::new("AT").timeout(Duration::from_secs(1)))
            .await
            .expect("exchange completes");
        assert_eq!(response, "OK");
    }

    #[tokio::test]
    async fn filters_response_to_expected_prefix() {
        let (channel, modem) = host_channel(1024);
        tokio::spawn(line_modem(modem, |cmd| {
            assert_eq!(cmd, "AT+CREG?");
            Some("+CREG: 0,1\r\n\r\nOK\r\n".to_string())
        }));

        let response = channel
            .send(
                AtCommand::new("AT+CREG?")
                    .expect_prefix("+CREG:")
                    .timeout(Duration::from_secs(1)),
            )
            .await
            .expect("exchange completes");
        assert_eq!(response, "+CREG: 0,1");
    }

    #[tokio::test]
    async fn non_responding_channel_times_out_within_bound() {
        let (channel, _modem) = host_channel(1024);

        let started = time::Instant::now();
        let result = channel
            .send(AtCommand::new("AT").timeout(Duration::from_millis(50)))
            .await;
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(AtError::Timeout)));
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(500), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn consecutive_exchanges_never_cross_talk() {
        let (channel, modem) = host_channel(1024);
        tokio::spawn(line_modem(modem, |cmd| match cmd {
            "FIRST" => Some("alpha\r\nOK\r\n".to_string()),
            "SECOND" => Some("beta\r\nOK\r\n".to_string()),
            other => panic!("unexpected command {other}"),
        }));

        let timeout = Duration::from_secs(1);
        let first = channel
            .send(AtCommand::new("FIRST").timeout(timeout))
            .await
            .expect("first exchange");
        let second = channel
            .send(AtCommand::new("SECOND").timeout(timeout))
            .await
            .expect("second exchange");

        assert!(first.contains("alpha"));
        assert!(!second.contains("alpha"), "stale lines leaked: {second}");
        assert!(second.contains("beta"));
    }

    #[tokio::test]
    async fn buffer_is_cleared_after_timed_out_exchange() {
        let (channel, modem) = host_channel(1024);
        tokio::spawn(line_modem(modem, |cmd| match cmd {
            // Never answer the first command.
            "SILENT" => None,
            "AT" => Some("OK\r\n".to_string()),
            other => panic!("unexpected command {other}"),
        }));

        let timed_out = channel
            .send(AtCommand::new("SILENT").timeout(Duration::from_millis(50)))
            .await;
        assert!(matches!(timed_out, Err(AtError::Timeout)));

        let response = channel
            .send(AtCommand::new("AT").timeout(Duration::from_secs(1)))
            .await
            .expect("second exchange completes");
        assert_eq!(response, "OK");
    }
}

mod mailbox_tests {
    use super::*;

    const LISTING: &str = concat!(
        "+CMGL: 1,\"REC UNREAD\",\"+15551234\",,\"25/01/01,12:00:00+00\"\r\n",
        "Hello\r\n",
        "+CMGL: 2,\"REC UNREAD\",\"+15550000\",,\"25/01/02,08:30:00+00\"\r\n",
        "Second message\r\n",
        "OK\r\n"
    );

    #[tokio::test]
    async fn lists_unread_records_from_the_wire() {
        let (channel, modem) = host_channel(4096);
        tokio::spawn(line_modem(modem, |cmd| {
            assert!(cmd.starts_with("AT+CMGL"));
            Some(LISTING.to_string())
        }));

        let mailbox = Mailbox::new(channel, Duration::from_secs(1));
        let records = mailbox.list_unread().await.expect("listing succeeds");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].index, 1);
        assert_eq!(records[0].sender, "+15551234");
        assert_eq!(records[0].timestamp, "25/01/01,12:00:00+00");
        assert_eq!(records[0].body, "Hello");
        assert_eq!(records[1].index, 2);
        assert_eq!(records[1].body, "Second message");
    }

    #[tokio::test]
    async fn delete_failure_is_swallowed() {
        let (channel, modem) = host_channel(1024);
        tokio::spawn(line_modem(modem, |cmd| {
            assert_eq!(cmd, "AT+CMGD=9");
            Some("ERROR\r\n".to_string())
        }));

        let mailbox = Mailbox::new(channel, Duration::from_secs(1));
        // Must not panic or error; the hazard is re-polling, not failure.
        mailbox.delete(9).await;
    }

    #[tokio::test]
    async fn send_writes_body_and_submit_terminator() {
        let (channel, modem) = host_channel(1024);
        let captured = capture_bytes(modem);

        let mailbox = Mailbox::new(channel, Duration::from_secs(1))
            .with_submit_prompt_timeout(Duration::from_millis(20))
            .with_submit_settle_delay(Duration::from_millis(10));
        mailbox.send("+1555", "hi").await.expect("send completes");

        let bytes = captured.lock().unwrap().clone();
        let written = String::from_utf8_lossy(&bytes);
        assert!(written.contains("AT+CMGS=\"+1555\"\r\n"), "got: {written:?}");
        assert!(written.contains("hi\u{1a}"), "got: {written:?}");
    }
}

mod bridge_tests {
    use super::*;

    fn test_config() -> BridgeConfig {
        BridgeConfig::default()
            .with_topics("sms/send", "sms/received")
            .with_poll_interval(Duration::from_millis(20))
            .with_command_timeout(Duration::from_millis(200))
            .with_network_check_interval(Duration::from_secs(60))
            .with_status_tick_interval(Duration::from_millis(10))
    }

    const THREE_RECORD_LISTING: &str = concat!(
        "+CMGL: 1,\"REC UNREAD\",\"+15551111\",,\"25/01/01,12:00:00+00\"\r\n",
        "first\r\n",
        "+CMGL: 2,\"REC UNREAD\",\"+15552222\",,\"25/01/01,12:01:00+00\"\r\n",
        "second\r\n",
        "+CMGL: 3,\"REC UNREAD\",\"+15553333\",,\"25/01/01,12:02:00+00\"\r\n",
        "third\r\n",
        "OK\r\n"
    );

    #[tokio::test]
    async fn forwards_each_record_once_in_index_order_and_deletes_it() {
        let (channel, modem) = host_channel(8192);
        let deletes = Arc::new(AtomicU32::new(0));
        let delete_count = Arc::clone(&deletes);
        let mut polls = 0u32;
        tokio::spawn(line_modem(modem, move |cmd| {
            if cmd.starts_with("AT+CMGL") {
                polls += 1;
                // Records are present on the first poll only; deletion
                // empties the mailbox.
                if polls == 1 {
                    Some(THREE_RECORD_LISTING.to_string())
                } else {
                    Some("OK\r\n".to_string())
                }
            } else if cmd.starts_with("AT+CMGD=") {
                delete_count.fetch_add(1, Ordering::SeqCst);
                Some("OK\r\n".to_string())
            } else if cmd.starts_with("AT+CREG?") {
                Some("+CREG: 0,1\r\nOK\r\n".to_string())
            } else {
                Some("OK\r\n".to_string())
            }
        }));

        let state = MockBrokerState::new(false);
        let broker = MockBroker {
            state: state.clone(),
        };
        let (_inbound_tx, inbound_rx) = mpsc::channel(8);
        let config = test_config();
        let sink = Arc::new(CountingSink::new());

        let mailbox = Mailbox::new(Arc::clone(&channel), config.command_timeout);
        let monitor = NetworkMonitor::new(channel, config.command_timeout);
        let bridge = MessageBridge::new(mailbox, monitor, broker, inbound_rx, config)
            .with_status_sink(Arc::clone(&sink) as Arc<dyn StatusSink>);
        let shutdown = bridge.shutdown_handle();
        let run = tokio::spawn(bridge.run());

        time::sleep(Duration::from_millis(300)).await;
        shutdown.stop();
        run.await.expect("run task").expect("bridge run");

        let published = state.published();
        assert_eq!(published.len(), 3, "each record published exactly once");
        let senders: Vec<String> = published
            .iter()
            .map(|(topic, payload)| {
                assert_eq!(topic, "sms/received");
                let value: serde_json::Value = serde_json::from_slice(payload).unwrap();
                assert_eq!(value["to"], "you");
                value["from"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(senders, ["+15551111", "+15552222", "+15553333"]);

        assert_eq!(deletes.load(Ordering::SeqCst), 3);
        assert!(sink.ticks.load(Ordering::SeqCst) > 0, "status sink ticked");
        let messages = sink.messages.lock().unwrap().clone();
        assert_eq!(messages, ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn already_deleted_index_is_never_republished() {
        let (channel, modem) = host_channel(4096);
        tokio::spawn(line_modem(modem, |cmd| {
            if cmd.starts_with("AT+CMGL") {
                // The same record keeps showing up: its delete keeps failing.
                Some(
                    concat!(
                        "+CMGL: 7,\"REC UNREAD\",\"+15557777\",,\"25/01/01,12:00:00+00\"\r\n",
                        "sticky\r\n",
                        "OK\r\n"
                    )
                    .to_string(),
                )
            } else if cmd.starts_with("AT+CMGD=") {
                Some("ERROR\r\n".to_string())
            } else if cmd.starts_with("AT+CREG?") {
                Some("+CREG: 0,1\r\nOK\r\n".to_string())
            } else {
                Some("OK\r\n".to_string())
            }
        }));

        let state = MockBrokerState::new(false);
        let broker = MockBroker {
            state: state.clone(),
        };
        let (_inbound_tx, inbound_rx) = mpsc::channel(8);
        let config = test_config();

        let mailbox = Mailbox::new(Arc::clone(&channel), config.command_timeout);
        let monitor = NetworkMonitor::new(channel, config.command_timeout);
        let bridge = MessageBridge::new(mailbox, monitor, broker, inbound_rx, config);
        let shutdown = bridge.shutdown_handle();
        let run = tokio::spawn(bridge.run());

        // Enough time for several polls of the same listing.
        time::sleep(Duration::from_millis(300)).await;
        shutdown.stop();
        run.await.expect("run task").expect("bridge run");

        assert_eq!(state.published().len(), 1, "index 7 republished");
    }

    #[tokio::test]
    async fn reconnect_exhaustion_fires_fatal_once_and_spares_other_loops() {
        let (channel, modem) = host_channel(1024);
        tokio::spawn(line_modem(modem, |cmd| {
            if cmd.starts_with("AT+CREG?") {
                Some("+CREG: 0,1\r\nOK\r\n".to_string())
            } else {
                Some("OK\r\n".to_string())
            }
        }));

        let state = MockBrokerState::new(true);
        let broker = MockBroker {
            state: state.clone(),
        };
        let (_inbound_tx, inbound_rx) = mpsc::channel(8);
        let config = test_config().with_reconnect(Duration::from_millis(20), 3);

        let fatal_calls = Arc::new(AtomicU32::new(0));
        let fatal_seen = Arc::clone(&fatal_calls);

        let mailbox = Mailbox::new(Arc::clone(&channel), config.command_timeout);
        let monitor = NetworkMonitor::new(channel, config.command_timeout);
        let bridge = MessageBridge::new(mailbox, monitor, broker, inbound_rx, config).on_fatal(
            move |reason| {
                assert_eq!(reason, crate::bridge::FATAL_BROKER_REASON);
                fatal_seen.fetch_add(1, Ordering::SeqCst);
            },
        );
        let shutdown = bridge.shutdown_handle();
        let run = tokio::spawn(bridge.run());

        time::sleep(Duration::from_millis(300)).await;
        assert_eq!(fatal_calls.load(Ordering::SeqCst), 1, "fatal exactly once");
        // Initial connect plus exactly three reconnect attempts, no more.
        assert_eq!(state.connect_attempts.load(Ordering::SeqCst), 4);
        // The reconnect loop alone has terminated; the bridge is still up.
        assert!(!run.is_finished());

        shutdown.stop();
        run.await.expect("run task").expect("bridge run");
    }

    #[tokio::test]
    async fn inbound_payload_triggers_one_send_and_bad_payload_none() {
        let (channel, modem) = host_channel(4096);
        let captured = capture_bytes(modem);

        // Broker stays down: only the inbound path is under test.
        let state = MockBrokerState::new(true);
        let broker = MockBroker { state };
        let (inbound_tx, inbound_rx) = mpsc::channel(8);
        let config = test_config()
            .with_command_timeout(Duration::from_millis(50))
            .with_reconnect(Duration::from_secs(10), 1000);

        let mailbox = Mailbox::new(Arc::clone(&channel), config.command_timeout)
            .with_submit_prompt_timeout(Duration::from_millis(20))
            .with_submit_settle_delay(Duration::from_millis(10));
        let monitor = NetworkMonitor::new(channel, config.command_timeout);
        let bridge = MessageBridge::new(mailbox, monitor, broker, inbound_rx, config);
        let shutdown = bridge.shutdown_handle();
        let run = tokio::spawn(bridge.run());

        inbound_tx
            .send(r#"{"to":"+1555","text":"hi"}"#.into())
            .await
            .expect("bridge is consuming");
        inbound_tx
            .send(r#"{"to":"+1555"}"#.into())
            .await
            .expect("bridge is consuming");

        time::sleep(Duration::from_millis(400)).await;
        shutdown.stop();
        run.await.expect("run task").expect("bridge run");

        let bytes = captured.lock().unwrap().clone();
        let written = String::from_utf8_lossy(&bytes).to_string();
        assert_eq!(
            written.matches("AT+CMGS=").count(),
            1,
            "exactly one submit, got: {written:?}"
        );
        assert!(written.contains("AT+CMGS=\"+1555\"\r\n"));
        assert!(written.contains("hi\u{1a}"));
    }
}
