//! Messages posted to the worker by the page.

use serde_json::Value;

use edureach_shared::constants::SKIP_WAITING_MESSAGE;
use edureach_shared::DecodeFault;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMessage {
    /// Adopt the installed generation now instead of waiting for old clients.
    SkipWaiting,
}

/// Parse a raw JSON message. Well-formed messages of an unknown type are
/// `Ok(None)`; text that is not a JSON object is a [`DecodeFault`].
pub fn parse_message(raw: &str) -> Result<Option<WorkerMessage>, DecodeFault> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Object(map) = value else {
        return Err(DecodeFault::Payload("worker message is not an object".into()));
    };
    Ok(match map.get("type").and_then(Value::as_str) {
        Some(SKIP_WAITING_MESSAGE) => Some(WorkerMessage::SkipWaiting),
        _ => None,
    })
}
