// ABOUTME: Registration-status queries and their classification contract
// ABOUTME: Registered means attached to the home network or roaming, nothing else

use std::sync::Arc;
use std::time::Duration;

use num_enum::TryFromPrimitive;
use tokio::io::AsyncWrite;

use crate::channel::CommandChannel;
use crate::command::AtCommand;
use crate::error::AtResult;

const REGISTRATION_QUERY: &str = "AT+CREG?";

/// Prefix of the status line in a registration-query response.
pub const REGISTRATION_PREFIX: &str = "+CREG:";

/// Network registration state, per the `<stat>` code of `+CREG: <n>,<stat>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum RegistrationStatus {
    NotRegistered = 0,
    Home = 1,
    Searching = 2,
    Denied = 3,
    Unknown = 4,
    Roaming = 5,
}

impl RegistrationStatus {
    /// A modem counts as registered when attached to its home network or
    /// roaming. Searching, denied and unknown states are not registered.
    pub fn is_registered(self) -> bool {
        matches!(self, Self::Home | Self::Roaming)
    }
}

/// Extract the registration status from raw `+CREG:` response lines.
///
/// Returns `None` when no status line is present or its `<stat>` field does
/// not name a known state.
pub fn classify(raw: &str) -> Option<RegistrationStatus> {
    let line = raw
        .lines()
        .map(str::trim_start)
        .find(|line| line.starts_with(REGISTRATION_PREFIX))?;
    let stat = line
        .strip_prefix(REGISTRATION_PREFIX)?
        .split(',')
        .nth(1)?
        .trim();
    let code: u8 = stat.parse().ok()?;
    RegistrationStatus::try_from(code).ok()
}

/// Periodic registration-status queries over the shared command channel.
#[derive(Debug)]
pub struct NetworkMonitor<W> {
    channel: Arc<CommandChannel<W>>,
    command_timeout: Duration,
}

impl<W> Clone for NetworkMonitor<W> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
            command_timeout: self.command_timeout,
        }
    }
}

impl<W: AsyncWrite + Unpin> NetworkMonitor<W> {
    pub fn new(channel: Arc<CommandChannel<W>>, command_timeout: Duration) -> Self {
        Self {
            channel,
            command_timeout,
        }
    }

    /// Issue one registration query, filtered to the status-line prefix.
    pub async fn check_once(&self) -> AtResult<String> {
        self.channel
            .send(
                AtCommand::new(REGISTRATION_QUERY)
                    .expect_prefix(REGISTRATION_PREFIX)
                    .timeout(self.command_timeout),
            )
            .await
    }
}
