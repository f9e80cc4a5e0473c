// ABOUTME: Parses the modem's multi-record unread-message listing into SmsRecords
// ABOUTME: Malformed records are skipped with a warning, never fatal to the listing call

use tracing::warn;

use crate::command;

/// Token introducing each record in a listing response.
const RECORD_DELIMITER: &str = "+CMGL:";

/// One stored message, addressed by its mailbox index.
///
/// The index is only meaningful until the record is deleted; the bridge must
/// not reuse an index after passing it to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsRecord {
    pub index: u32,
    pub sender: String,
    pub timestamp: String,
    pub body: String,
}

/// Parse the joined response of a `AT+CMGL="REC UNREAD"` exchange.
///
/// Record grammar: a metadata line
/// `<index>,<status>,"<sender>",,"<timestamp>"` followed by the body on the
/// next line. The quoted timestamp itself contains a comma, so the metadata
/// split is limited to five fields and the fifth keeps the remainder.
///
/// Returns whatever records parsed successfully; malformed records are
/// logged and dropped.
pub fn parse_unread_listing(response: &str) -> Vec<SmsRecord> {
    let trimmed = response.trim_end();
    let trimmed = trimmed
        .strip_suffix(command::TERMINAL_OK)
        .or_else(|| trimmed.strip_suffix(command::TERMINAL_ERROR))
        .unwrap_or(trimmed);

    let mut records = Vec::new();
    for raw in trimmed.split(RECORD_DELIMITER).skip(1) {
        match parse_record(raw) {
            Some(record) => records.push(record),
            None => warn!(record = raw.trim(), "skipping malformed mailbox record"),
        }
    }
    records
}

fn parse_record(raw: &str) -> Option<SmsRecord> {
    let raw = raw.trim_start();
    let (metadata, body) = match raw.split_once('\n') {
        Some((metadata, body)) => (metadata, body.trim()),
        None => (raw.trim_end(), ""),
    };

    let fields: Vec<&str> = metadata.splitn(5, ',').collect();
    if fields.len() < 5 {
        return None;
    }

    let index = fields[0].trim().parse().ok()?;
    let sender = fields[2].trim().trim_matches('"').to_string();
    let timestamp = fields[4].trim().trim_matches('"').to_string();
    Some(SmsRecord {
        index,
        sender,
        timestamp,
        body: body.to_string(),
    })
}
