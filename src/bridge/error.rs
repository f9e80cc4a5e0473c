// ABOUTME: Error types for broker interaction and bridge orchestration
// ABOUTME: Broker errors stay implementation-agnostic so mock clients need no MQTT types

use thiserror::Error;

use crate::error::AtError;

/// Error produced by a [`BrokerClient`](crate::bridge::BrokerClient)
/// operation. Implementation details are carried as strings so the trait
/// surface stays free of any concrete broker library.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("not connected to the broker")]
    NotConnected,

    #[error("timed out waiting for the broker")]
    Timeout,

    #[error("broker client error: {0}")]
    Client(String),
}

/// Top-level bridge error.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("modem error: {0}")]
    At(#[from] AtError),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("payload error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
