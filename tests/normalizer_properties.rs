//! Normalization properties

mod common;

use common::strategies::*;
use proptest::prelude::*;
use serde_json::{Map, Value};
use servicebus_consumer::messaging::{normalize, MessageBody, QueueMessage};

proptest! {
    /// Property: JSON text bodies parse to the same value, raw body kept verbatim
    #[test]
    fn json_bodies_are_parsed(value in json_value_strategy()) {
        let text = serde_json::to_string(&value).unwrap();
        let normalized = normalize(&QueueMessage::new(text.as_str()));

        prop_assert_eq!(&normalized.body, &value);
        prop_assert_eq!(normalized.raw_body.as_deref(), Some(text.as_str()));
    }

    /// Property: non-JSON text passes through unchanged
    #[test]
    fn non_json_bodies_pass_through(text in non_json_text_strategy()) {
        let normalized = normalize(&QueueMessage::new(text.as_str()));
        prop_assert_eq!(normalized.body, Value::String(text));
    }

    /// Property: binary bodies never fail to normalize
    #[test]
    fn arbitrary_bytes_always_normalize(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let normalized = normalize(&QueueMessage::new(MessageBody::Binary(bytes.clone())));
        let expected = String::from_utf8_lossy(&bytes).into_owned();
        prop_assert_eq!(normalized.raw_body, Some(expected));
    }

    /// Property: absent metadata becomes empty values
    #[test]
    fn missing_metadata_defaults_to_empty(
        message_id in optional_id_strategy(),
        correlation_id in optional_id_strategy(),
    ) {
        let mut raw = QueueMessage::new("{}");
        raw.message_id = message_id.clone();
        raw.correlation_id = correlation_id.clone();

        let normalized = normalize(&raw);
        prop_assert_eq!(normalized.message_id, message_id.unwrap_or_default());
        prop_assert_eq!(normalized.correlation_id, correlation_id.unwrap_or_default());
        prop_assert_eq!(normalized.content_type, "");
        prop_assert_eq!(normalized.sequence_number, "");
        prop_assert_eq!(normalized.application_properties, Map::new());
    }

    /// Property: sequence numbers survive as exact decimal strings
    #[test]
    fn sequence_numbers_are_exact(sequence in any::<i64>()) {
        let normalized = normalize(&QueueMessage::new("x").with_sequence_number(sequence));
        prop_assert_eq!(normalized.sequence_number.parse::<i64>().unwrap(), sequence);
    }

    /// Property: normalizing twice yields equal records
    #[test]
    fn normalization_is_idempotent(value in json_value_strategy(), id in optional_id_strategy()) {
        let mut raw = QueueMessage::new(value);
        raw.message_id = id;
        prop_assert_eq!(normalize(&raw), normalize(&raw));
    }
}
