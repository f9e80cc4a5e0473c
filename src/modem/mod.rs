//! Modem operations built on top of the command channel.
//!
//! * [`Mailbox`] — list unread messages, delete by index, send outbound text
//! * [`NetworkMonitor`] — registration-status queries with an explicit
//!   classification contract
//! * [`initialize`] — the bring-up command sequence for a freshly powered
//!   modem
//!
//! Everything here issues commands through one shared
//! [`CommandChannel`](crate::channel::CommandChannel), so operations from
//! different loops serialize on the channel's exchange lock.

pub mod mailbox;
pub mod network;
pub mod record;

pub use mailbox::Mailbox;
pub use network::{NetworkMonitor, RegistrationStatus};
pub use record::{SmsRecord, parse_unread_listing};

use tokio::io::AsyncWrite;
use tracing::{debug, warn};

use crate::channel::CommandChannel;
use crate::command::AtCommand;
use crate::error::{AtError, AtResult};

/// Modem bring-up sequence: probe, echo off, text mode, store received
/// messages on the modem, clear the mailbox.
const INIT_SEQUENCE: [&str; 5] = ["AT", "ATE0", "AT+CMGF=1", "AT+CNMI=2,0,0,0,0", "AT+CMGD=1,4"];

/// Run the modem initialization sequence.
///
/// A step that times out or answers `ERROR` is logged and skipped rather than
/// aborting bring-up; only transport-level I/O failures propagate.
pub async fn initialize<W>(channel: &CommandChannel<W>) -> AtResult<()>
where
    W: AsyncWrite + Unpin,
{
    for cmd in INIT_SEQUENCE {
        match channel.send(AtCommand::new(cmd)).await {
            Ok(response) => debug!(command = cmd, %response, "init step complete"),
            Err(AtError::Timeout) => {
                warn!(command = cmd, "no terminal response during modem init")
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
