// ABOUTME: Mailbox operations over the command channel: list unread, delete, send
// ABOUTME: Sending is fire-and-forget by design; no delivery confirmation is parsed

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::time;
use tracing::{debug, warn};

use crate::channel::CommandChannel;
use crate::command::{self, AtCommand};
use crate::error::{AtError, AtResult};
use crate::modem::record::{self, SmsRecord};

const LIST_UNREAD: &str = "AT+CMGL=\"REC UNREAD\"";

/// The `AT+CMGS` prompt carries no line ending, so the exchange never reaches
/// a terminal line; a short timeout stands in for prompt detection.
const SUBMIT_PROMPT_TIMEOUT: Duration = Duration::from_secs(1);

/// Settle delay after submitting a message body.
const SUBMIT_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// The modem's store of received messages, addressed by index.
///
/// Cheap to clone; clones share the underlying command channel.
#[derive(Debug)]
pub struct Mailbox<W> {
    channel: Arc<CommandChannel<W>>,
    command_timeout: Duration,
    submit_prompt_timeout: Duration,
    submit_settle_delay: Duration,
}

impl<W> Clone for Mailbox<W> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
            command_timeout: self.command_timeout,
            submit_prompt_timeout: self.submit_prompt_timeout,
            submit_settle_delay: self.submit_settle_delay,
        }
    }
}

impl<W: AsyncWrite + Unpin> Mailbox<W> {
    pub fn new(channel: Arc<CommandChannel<W>>, command_timeout: Duration) -> Self {
        Self {
            channel,
            command_timeout,
            submit_prompt_timeout: SUBMIT_PROMPT_TIMEOUT,
            submit_settle_delay: SUBMIT_SETTLE_DELAY,
        }
    }

    /// Override the prompt wait used by [`send`](Self::send).
    pub fn with_submit_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.submit_prompt_timeout = timeout;
        self
    }

    /// Override the settle delay used by [`send`](Self::send).
    pub fn with_submit_settle_delay(mut self, delay: Duration) -> Self {
        self.submit_settle_delay = delay;
        self
    }

    /// List unread messages.
    ///
    /// Returns whatever records parsed successfully; a partially malformed
    /// listing never fails the call.
    pub async fn list_unread(&self) -> AtResult<Vec<SmsRecord>> {
        let response = self
            .channel
            .send(AtCommand::new(LIST_UNREAD).timeout(self.command_timeout))
            .await?;
        Ok(record::parse_unread_listing(&response))
    }

    /// Delete the stored message at `index`.
    ///
    /// Failure is logged and swallowed: a failed delete must not halt the
    /// forwarding loop, at the cost of that record showing up again on the
    /// next poll.
    pub async fn delete(&self, index: u32) {
        let cmd = AtCommand::new(format!("AT+CMGD={index}")).timeout(self.command_timeout);
        match self.channel.send(cmd).await {
            Ok(_) => debug!(index, "deleted stored message"),
            Err(e) => {
                warn!(index, error = %e, "delete failed; record may be polled again")
            }
        }
    }

    /// Send `text` to `number`.
    ///
    /// Fire-and-forget: the command prompt is not parsed (the prompt timeout
    /// expiring is the expected path), no submit confirmation is read back,
    /// and a fixed settle delay stands in for delivery feedback. Callers get
    /// no guarantee beyond "the body was written to the transport".
    pub async fn send(&self, number: &str, text: &str) -> AtResult<()> {
        let cmd =
            AtCommand::new(format!("AT+CMGS=\"{number}\"")).timeout(self.submit_prompt_timeout);
        match self.channel.send(cmd).await {
            Ok(_) | Err(AtError::Timeout) => {}
            Err(e) => return Err(e),
        }

        let mut payload = text.as_bytes().to_vec();
        payload.push(command::SUBMIT_TERMINATOR);
        self.channel.write_raw(&payload).await?;

        time::sleep(self.submit_settle_delay).await;
        debug!(to = number, "message body submitted");
        Ok(())
    }
}
