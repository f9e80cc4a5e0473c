// ABOUTME: Command/response exchange engine over the modem's serial transport
// ABOUTME: Enforces one in-flight command at a time and bounds every wait by a timeout

use std::sync::{Arc, Mutex as StdMutex};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, watch};
use tokio::time::{self, Instant};
use tracing::{debug, trace};

use crate::command::{self, AtCommand};
use crate::error::{AtError, AtResult};

/// Serializes command/response exchanges over the shared serial transport.
///
/// The channel is the single writer of the transport; the paired
/// [`ResponseReader`] is its single reader. An exchange mutex guarantees that
/// exactly one command is in flight at any instant; concurrent callers queue
/// in submission order, so all higher-level operations (mailbox listing,
/// deletion, sending, network queries) are serialized relative to each other
/// even though they run from independent loops.
///
/// The response buffer always corresponds to the most recently submitted,
/// not-yet-completed command: it is cleared, together with the completion
/// flag, before the command bytes are written, which eliminates races with
/// stale data from a prior exchange.
#[derive(Debug)]
pub struct CommandChannel<W> {
    exchange: Mutex<Exchange<W>>,
    lines: Arc<StdMutex<Vec<String>>>,
}

#[derive(Debug)]
struct Exchange<W> {
    writer: W,
    complete_tx: Arc<watch::Sender<bool>>,
    complete_rx: watch::Receiver<bool>,
}

/// Background task draining the transport.
///
/// Reads one line per iteration, strips the line ending and appends the line
/// to the pending response buffer. A terminal `OK`/`ERROR` line raises the
/// completion flag observed by [`CommandChannel::send`]. Must never be
/// duplicated for a given transport.
#[derive(Debug)]
pub struct ResponseReader<R> {
    reader: BufReader<R>,
    lines: Arc<StdMutex<Vec<String>>>,
    complete: Arc<watch::Sender<bool>>,
}

/// Builds a command channel and its response reader over a split transport.
///
/// The caller owns scheduling of the reader, typically
/// `tokio::spawn(reader.run())`, so the channel itself stays free of task
/// lifecycle concerns.
pub fn command_channel<R, W>(reader: R, writer: W) -> (CommandChannel<W>, ResponseReader<R>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let lines = Arc::new(StdMutex::new(Vec::new()));
    let (complete_tx, complete_rx) = watch::channel(false);
    let complete_tx = Arc::new(complete_tx);

    let channel = CommandChannel {
        exchange: Mutex::new(Exchange {
            writer,
            complete_tx: Arc::clone(&complete_tx),
            complete_rx,
        }),
        lines: Arc::clone(&lines),
    };
    let reader = ResponseReader {
        reader: BufReader::new(reader),
        lines,
        complete: complete_tx,
    };
    (channel, reader)
}

impl<W: AsyncWrite + Unpin> CommandChannel<W> {
    /// Perform one command/response exchange.
    ///
    /// Holds the exchange lock for the duration of the call. On completion,
    /// returns the buffered lines joined with `\n`: filtered to the expected
    /// prefix when one was given, otherwise trimmed as a whole. Expiry of the
    /// command timeout yields [`AtError::Timeout`].
    pub async fn send(&self, cmd: AtCommand) -> AtResult<String> {
        let mut exchange = self.exchange.lock().await;

        self.lines
            .lock()
            .expect("response buffer lock poisoned")
            .clear();
        exchange.complete_tx.send_replace(false);

        exchange.writer.write_all(cmd.text.as_bytes()).await?;
        exchange
            .writer
            .write_all(command::LINE_ENDING.as_bytes())
            .await?;
        exchange.writer.flush().await?;
        trace!(command = %cmd.text, "command written");

        let deadline = Instant::now() + cmd.timeout;
        match time::timeout_at(deadline, exchange.complete_rx.wait_for(|done| *done)).await {
            Ok(Ok(_)) => {}
            // The completion sender lives as long as the exchange state, so a
            // receive error here only means the channel is being torn down.
            Ok(Err(_)) | Err(_) => {
                debug!(command = %cmd.text, "exchange timed out");
                return Err(AtError::Timeout);
            }
        }

        let lines = self.lines.lock().expect("response buffer lock poisoned");
        let response = match &cmd.expected_prefix {
            Some(prefix) => lines
                .iter()
                .filter(|line| line.starts_with(prefix.as_str()))
                .cloned()
                .collect::<Vec<_>>()
                .join("\n"),
            None => lines.join("\n").trim().to_string(),
        };
        trace!(command = %cmd.text, %response, "exchange complete");
        Ok(response)
    }

    /// Write raw bytes to the transport without waiting for a response.
    ///
    /// Takes the exchange lock for the duration of the write. Used for the
    /// SMS body submitted after `AT+CMGS`, which the line protocol does not
    /// acknowledge with a parseable terminal line.
    pub async fn write_raw(&self, payload: &[u8]) -> AtResult<()> {
        let mut exchange = self.exchange.lock().await;
        exchange.writer.write_all(payload).await?;
        exchange.writer.flush().await?;
        Ok(())
    }
}

impl<R: AsyncRead + Unpin> ResponseReader<R> {
    /// Drain the transport until it closes.
    ///
    /// EOF and read errors end the task quietly: during a cooperative stop
    /// the transport may be torn down underneath an in-flight read, and that
    /// final error is expected rather than a fault.
    pub async fn run(mut self) {
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line).await {
                Ok(0) => {
                    debug!("transport closed, response reader exiting");
                    return;
                }
                Ok(_) => {
                    let decoded = line.trim_end_matches(['\r', '\n']).to_string();
                    trace!(line = %decoded, "modem line");
                    let terminal = command::is_terminal(&decoded);
                    self.lines
                        .lock()
                        .expect("response buffer lock poisoned")
                        .push(decoded);
                    if terminal {
                        self.complete.send_replace(true);
                    }
                }
                Err(e) => {
                    debug!(error = %e, "transport read failed, response reader exiting");
                    return;
                }
            }
        }
    }
}
