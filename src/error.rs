// ABOUTME: Error types for AT command exchanges over the serial transport
// ABOUTME: Keeps timeout explicit so callers never mistake it for an empty response

use std::io;
use thiserror::Error;

/// Error produced by a single command/response exchange.
#[derive(Debug, Error)]
pub enum AtError {
    /// No terminal line arrived within the exchange timeout.
    ///
    /// A distinct variant so downstream parsing never confuses "the modem
    /// said nothing" with "the modem said something empty".
    #[error("command timed out waiting for a terminal response")]
    Timeout,

    /// I/O failure on the shared transport.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for modem operations.
pub type AtResult<T> = Result<T, AtError>;
