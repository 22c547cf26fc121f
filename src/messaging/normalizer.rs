//! # Message Normalizer
//!
//! Converts a raw [`QueueMessage`] into the canonical [`NormalizedMessage`]
//! handed to emission sinks. Normalization is pure and total: absent
//! metadata falls back to empty values and an unparseable body is carried
//! as its raw string.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::message::QueueMessage;

/// Canonical record emitted for every acknowledged message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMessage {
    /// Parsed JSON when the body is JSON text, the raw string otherwise
    pub body: Value,
    /// Pre-parse string form of the body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<String>,
    pub message_id: String,
    /// ISO-8601 timestamp, empty when the provider did not supply one
    pub enqueued_time: String,
    /// Decimal string so 64-bit values survive JSON consumers
    pub sequence_number: String,
    pub content_type: String,
    pub correlation_id: String,
    pub application_properties: Map<String, Value>,
}

impl NormalizedMessage {
    /// Drop the raw body from the record
    pub fn without_raw_body(mut self) -> Self {
        self.raw_body = None;
        self
    }
}

/// Normalize a raw provider message. Never fails.
pub fn normalize(raw: &QueueMessage) -> NormalizedMessage {
    let raw_body = raw.body.decode_to_string();
    let body = parse_body(&raw_body);

    NormalizedMessage {
        body,
        raw_body: Some(raw_body),
        message_id: raw.message_id.clone().unwrap_or_default(),
        enqueued_time: raw
            .enqueued_time
            .map(|time| time.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default(),
        sequence_number: raw
            .sequence_number
            .map(|seq| seq.to_string())
            .unwrap_or_default(),
        content_type: raw.content_type.clone().unwrap_or_default(),
        correlation_id: raw.correlation_id.clone().unwrap_or_default(),
        application_properties: raw.application_properties.clone(),
    }
}

fn parse_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
