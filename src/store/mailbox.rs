//! On-disk format of a mailbox log
//!
//! Messages are appended one after another, each followed by `\n.\n`. Lines
//! starting with `.` are dot-escaped on the way in so a message can never
//! contain the separator.

use chrono::NaiveDateTime;

use crate::store::error::StoreError;
use crate::transparency::{stuff_line, unstuff_line};

/// Record separator in the log
pub const SEPARATOR: &str = "\n.\n";

/// Headers every stored message starts with, in order
const REQUIRED_HEADERS: [&str; 3] = ["From", "To", "Subject"];

/// Format of the `Received:` stamp
const RECEIVED_FORMAT: &str = "%Y-%m-%d:%H:%M";

/// Insert the `Received:` line after the From/To/Subject headers
pub fn stamp_received(raw: &str, received: NaiveDateTime) -> Result<String, StoreError> {
    let mut lines: Vec<&str> = raw.lines().collect();

    if lines.len() < REQUIRED_HEADERS.len() {
        return Err(StoreError::MalformedMessage(
            "message must start with From, To and Subject headers".to_string(),
        ));
    }

    for (line, expected) in lines.iter().zip(REQUIRED_HEADERS) {
        let name = line.split_once(':').map(|(name, _)| name.trim());
        if !name.is_some_and(|n| n.eq_ignore_ascii_case(expected)) {
            return Err(StoreError::MalformedMessage(format!(
                "expected {expected} header, found {line:?}"
            )));
        }
    }

    let stamp = format!("Received: {}", received.format(RECEIVED_FORMAT));
    lines.insert(REQUIRED_HEADERS.len(), &stamp);
    Ok(lines.join("\n"))
}

/// Serialize one message as a log record
pub fn encode_record(message: &str) -> String {
    let mut out = message
        .split('\n')
        .map(stuff_line)
        .collect::<Vec<_>>()
        .join("\n");
    out.push_str(SEPARATOR);
    out
}

/// Split a whole log into messages.
///
/// Empty records are an artifact of the separator convention, not messages.
pub fn decode_log(log: &str) -> Vec<String> {
    log.split(SEPARATOR)
        .filter(|record| !record.is_empty())
        .map(|record| {
            record
                .split('\n')
                .map(unstuff_line)
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect()
}

/// Serialize a sequence of messages as a complete log
pub fn encode_log<'a>(messages: impl IntoIterator<Item = &'a str>) -> String {
    messages.into_iter().map(encode_record).collect()
}
