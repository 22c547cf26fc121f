//! # Raw Queue Messages
//!
//! Provider-supplied records as they come off a receive or peek call. A
//! [`QueueMessage`] is immutable once received and stays owned by the session
//! until it has been acknowledged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque message body as delivered by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum MessageBody {
    /// Body already decoded to text by the provider
    Text(String),
    /// Raw bytes, expected to hold UTF-8
    Binary(Vec<u8>),
    /// Structured payload (AMQP value sections, typed SDK bodies)
    Structured(Value),
}

impl MessageBody {
    /// Decode the body into its string form.
    ///
    /// Text passes through, bytes are decoded as UTF-8 (invalid sequences are
    /// replaced rather than rejected) and structured values are serialized
    /// as JSON text.
    pub fn decode_to_string(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Binary(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Self::Structured(value) => value.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
            Self::Structured(value) => value.to_string().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for MessageBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for MessageBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<u8>> for MessageBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

impl From<Value> for MessageBody {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

/// Message as received from the queue provider
#[derive(Debug, Clone, PartialEq)]
pub struct QueueMessage {
    /// Message payload
    pub body: MessageBody,
    /// Provider or sender assigned identifier
    pub message_id: Option<String>,
    /// When the broker accepted the message
    pub enqueued_time: Option<DateTime<Utc>>,
    /// Broker assigned ordering number (full 64-bit range)
    pub sequence_number: Option<i64>,
    /// MIME type set by the sender
    pub content_type: Option<String>,
    /// Correlation identifier set by the sender
    pub correlation_id: Option<String>,
    /// User properties; values are JSON scalars
    pub application_properties: Map<String, Value>,
    /// Peek-lock token used to complete the message
    pub lock_token: Option<String>,
    /// Number of times the broker has handed this message out
    pub delivery_count: u32,
}

impl QueueMessage {
    /// Create a message with only a body; metadata defaults to absent
    pub fn new(body: impl Into<MessageBody>) -> Self {
        Self {
            body: body.into(),
            message_id: None,
            enqueued_time: None,
            sequence_number: None,
            content_type: None,
            correlation_id: None,
            application_properties: Map::new(),
            lock_token: None,
            delivery_count: 0,
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_enqueued_time(mut self, enqueued_time: DateTime<Utc>) -> Self {
        self.enqueued_time = Some(enqueued_time);
        self
    }

    pub fn with_sequence_number(mut self, sequence_number: i64) -> Self {
        self.sequence_number = Some(sequence_number);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.application_properties.insert(key.into(), value.into());
        self
    }

    pub fn with_lock_token(mut self, lock_token: impl Into<String>) -> Self {
        self.lock_token = Some(lock_token.into());
        self
    }

    /// Identifier used in logs and acknowledgment errors
    pub fn display_id(&self) -> String {
        self.message_id
            .clone()
            .or_else(|| self.sequence_number.map(|seq| seq.to_string()))
            .unwrap_or_else(|| "<unidentified>".to_string())
    }
}
