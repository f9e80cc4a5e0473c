//! AT command descriptors and serial protocol tokens.
//!
//! Commands travel to the modem as CRLF-terminated text lines; the modem
//! answers with newline-delimited lines and closes every exchange with a
//! terminal `OK` or `ERROR` line. The tokens live here so the channel, the
//! mailbox operations and the tests all agree on them.

use std::time::Duration;

/// Line ending appended to every command written to the modem.
pub const LINE_ENDING: &str = "\r\n";

/// Terminal line closing a successful exchange.
pub const TERMINAL_OK: &str = "OK";

/// Terminal line closing a failed exchange.
pub const TERMINAL_ERROR: &str = "ERROR";

/// Ctrl-Z byte that submits a message body after `AT+CMGS`.
pub const SUBMIT_TERMINATOR: u8 = 0x1A;

/// Default bound on how long a single exchange may wait for its terminal line.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Returns true when `line` completes an exchange.
pub fn is_terminal(line: &str) -> bool {
    line == TERMINAL_OK || line == TERMINAL_ERROR
}

/// One command/response exchange descriptor.
///
/// Transient by design: an `AtCommand` exists only for the duration of a
/// single [`CommandChannel::send`](crate::channel::CommandChannel::send) call.
///
/// # Example
///
/// ```rust
/// use sms_gateway::command::AtCommand;
/// use std::time::Duration;
///
/// let cmd = AtCommand::new("AT+CREG?")
///     .expect_prefix("+CREG:")
///     .timeout(Duration::from_secs(2));
/// assert_eq!(cmd.text, "AT+CREG?");
/// ```
#[derive(Debug, Clone)]
pub struct AtCommand {
    /// Command text, without the trailing line ending.
    pub text: String,
    /// When set, the response is filtered to lines starting with this prefix.
    pub expected_prefix: Option<String>,
    /// Bound on the wait for the terminal line.
    pub timeout: Duration,
}

impl AtCommand {
    /// Create a command with the default timeout and no response filter.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            expected_prefix: None,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Filter the response to lines starting with `prefix`.
    pub fn expect_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.expected_prefix = Some(prefix.into());
        self
    }

    /// Override the exchange timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
