// ABOUTME: JSON payload schemas exchanged with the broker
// ABOUTME: Explicit structs, not dynamically inferred shapes; versionable in one place

use serde::{Deserialize, Serialize};

use crate::modem::SmsRecord;

/// Inbound broker payload asking the bridge to send a message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendRequest {
    pub to: String,
    pub text: String,
}

/// Outbound broker payload carrying one forwarded message.
///
/// `to` is the fixed literal `"you"`: the gateway serves a single operator
/// and the field exists for schema symmetry with [`SendRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwardedSms {
    pub to: String,
    pub from: String,
    pub time: String,
    pub text: String,
}

impl ForwardedSms {
    pub fn from_record(record: &SmsRecord) -> Self {
        Self {
            to: "you".to_string(),
            from: record.sender.clone(),
            time: record.timestamp.clone(),
            text: record.body.clone(),
        }
    }
}
